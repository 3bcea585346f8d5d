//! Reconciliation engine: pull calendar events into the schedule database and
//! push unsynced schedule records out to their bound calendars.
//!
//! Each pass is a failure containment unit. Per-item anomalies are logged and
//! skipped; the first store or transport fault aborts the rest of the pass and
//! is reported as [`PassResult::Error`].

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::ScheduleFields;
use crate::error::Result;
use crate::integrations::{
    EventQuery, EventSource, Filter, NewEvent, PropertyKind, Query, RecordStore, RemoteEvent,
};
use crate::sync::binding::{BindingTable, CalendarBinding};
use crate::sync::projector::FieldProjector;
use crate::sync::resolver::IdentityResolver;
use crate::sync::types::{Event, PassResult, PullReport, PushReport, SyncReport};

/// Title given to events without a summary.
pub const DEFAULT_TITLE: &str = "No Title";

/// Events listed per calendar per pull pass unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 20;

pub struct Reconciler<'a> {
    store: &'a dyn RecordStore,
    source: &'a dyn EventSource,
    bindings: &'a BindingTable,
    projector: FieldProjector,
    database_id: String,
    page_size: usize,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        source: &'a dyn EventSource,
        bindings: &'a BindingTable,
        fields: ScheduleFields,
        database_id: &str,
    ) -> Self {
        Self {
            store,
            source,
            bindings,
            projector: FieldProjector::new(fields),
            database_id: database_id.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Pull upcoming events (start >= `now`) from every bound calendar.
    pub fn pull(&self, now: DateTime<Utc>) -> PassResult<PullReport> {
        let mut report = PullReport::default();
        match self.run_pull(now, &mut report) {
            Ok(()) => {
                info!(added = report.added, updated = report.updated, "pull pass complete");
                PassResult::Success(report)
            }
            Err(e) => {
                error!(
                    error = %e,
                    added = report.added,
                    updated = report.updated,
                    "pull pass aborted; partial counts discarded"
                );
                PassResult::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Push every schedule record without a foreign id to its bound calendar.
    pub fn push(&self) -> PassResult<PushReport> {
        let mut report = PushReport::default();
        match self.run_push(&mut report) {
            Ok(()) => {
                info!(pushed = report.pushed, "push pass complete");
                PassResult::Success(report)
            }
            Err(e) => {
                error!(
                    error = %e,
                    pushed = report.pushed,
                    "push pass aborted; partial counts discarded"
                );
                PassResult::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Pull, then push. The push runs even when the pull failed.
    pub fn pull_and_push(&self, now: DateTime<Utc>) -> SyncReport {
        let pull = self.pull(now);
        let push = self.push();
        SyncReport {
            pull,
            push,
            timestamp: Utc::now(),
        }
    }

    fn run_pull(&self, now: DateTime<Utc>, report: &mut PullReport) -> Result<()> {
        let resolver = IdentityResolver::new(self.store, &self.database_id, &self.projector);

        for binding in self.bindings.iter() {
            let query = EventQuery::upcoming(&binding.calendar_id, now, self.page_size);
            let remote = self.source.list_events(&query)?;
            debug!(calendar = %binding.calendar_id, count = remote.len(), "listed events");

            for remote_event in &remote {
                let Some(event) = event_from_remote(remote_event, binding) else {
                    continue;
                };
                // the listing window bounds event ends; only upcoming starts are mirrored
                if event.start.instant().is_some_and(|start| start < now) {
                    debug!(foreign_id = %event.foreign_id, start = %event.start, "event already started; skipping");
                    continue;
                }
                let properties = self.projector.to_properties(&event);

                match resolver.resolve(&event.foreign_id)? {
                    Some(existing) => {
                        self.store.update(&existing.record_id, &properties)?;
                        report.updated += 1;
                        debug!(foreign_id = %event.foreign_id, record = %existing.record_id, "updated record");
                    }
                    None => {
                        let id = self.store.create(&self.database_id, &properties)?;
                        report.added += 1;
                        debug!(foreign_id = %event.foreign_id, record = %id, "created record");
                    }
                }
            }
        }
        Ok(())
    }

    // A record whose foreign-id write-back fails after the insert succeeded
    // is pushed again on the next pass, creating a duplicate remote event.
    fn run_push(&self, report: &mut PushReport) -> Result<()> {
        let fields = self.projector.fields();
        let query = Query::new().filter(Filter::is_empty(&fields.foreign_id, PropertyKind::RichText));
        let pending = self.store.query(&self.database_id, &query)?;

        for stored in pending.iter().filter(|r| !r.archived) {
            let record = self.projector.record_from_stored(stored);
            let projected = match self.projector.to_event(&record) {
                Ok(projected) => projected,
                Err(e) => {
                    warn!(record = %record.record_id, field = e.field, "skipping incomplete record");
                    continue;
                }
            };

            let Some(calendar_id) = self.bindings.calendar_for(&projected.context, &projected.kind)
            else {
                warn!(
                    record = %record.record_id,
                    context = %projected.context,
                    kind = %projected.kind,
                    "no calendar bound to context/type; skipping"
                );
                continue;
            };

            let Some(new_event) = NewEvent::with_bounds(&projected.title, &projected.start, &projected.end)
            else {
                warn!(
                    record = %record.record_id,
                    start = %projected.start,
                    end = %projected.end,
                    "event bounds cannot form a calendar range; skipping"
                );
                continue;
            };
            let foreign_id = self.source.insert_event(calendar_id, &new_event)?;
            self.store
                .update(&record.record_id, &self.projector.foreign_id_update(&foreign_id))?;
            report.pushed += 1;
            debug!(record = %record.record_id, %foreign_id, calendar = calendar_id, "pushed record");
        }
        Ok(())
    }
}

/// Label a listed event with its binding. `None` for events that cannot be
/// reconciled (no id, no start).
pub(crate) fn event_from_remote(remote: &RemoteEvent, binding: &CalendarBinding) -> Option<Event> {
    let Some(foreign_id) = remote.id.clone().filter(|id| !id.trim().is_empty()) else {
        warn!(calendar = %binding.calendar_id, summary = ?remote.summary, "event without id; skipping");
        return None;
    };
    let Some(start) = remote.start.clone() else {
        warn!(calendar = %binding.calendar_id, %foreign_id, "event without start; skipping");
        return None;
    };
    let title = remote
        .summary
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    Some(Event {
        foreign_id,
        title,
        start,
        end: remote.end.clone(),
        source_label: binding.source_label().to_string(),
        context: binding.context.clone(),
        kind: binding.kind.clone(),
    })
}
