//! In-process record store and event source.
//!
//! Both evaluate queries the way the remote services do (filters, archived
//! flags, ascending sort, result caps) so passes can be rehearsed offline
//! against a fixture and exercised in tests. Failure injection simulates
//! transport faults at a chosen call.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::traits::{EventQuery, EventSource, Filter, Query, RecordStore};
use super::types::{DatabaseInfo, EventTime, NewEvent, PropertySet, PropertyValue, RemoteEvent, StoredRecord};
use crate::error::{CoreError, Result};

/// Store operation, for write journals and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOp {
    Query,
    Create,
    Update,
    RetrieveDatabase,
    ListEvents,
    InsertEvent,
}

/// A write observed by the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub op: StoreOp,
    pub record_id: String,
    pub properties: PropertySet,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    op: StoreOp,
    remaining_successes: usize,
}

fn check_failure(slot: &Mutex<Option<Failure>>, op: StoreOp, service: &str) -> Result<()> {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    match slot.as_mut() {
        Some(failure) if failure.op == op => {
            if failure.remaining_successes == 0 {
                Err(CoreError::integration(
                    service,
                    format!("injected failure on {op:?}"),
                ))
            } else {
                failure.remaining_successes -= 1;
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    databases: Mutex<BTreeMap<String, Vec<StoredRecord>>>,
    titles: Mutex<BTreeMap<String, String>>,
    writes: Mutex<Vec<WriteRecord>>,
    failure: Mutex<Option<Failure>>,
    next_id: Mutex<u64>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_databases(databases: BTreeMap<String, Vec<StoredRecord>>) -> Self {
        Self {
            databases: Mutex::new(databases),
            ..Self::default()
        }
    }

    /// Insert a record directly, bypassing the write journal.
    pub fn seed(&self, database_id: &str, record: StoredRecord) {
        self.databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(database_id.to_string())
            .or_default()
            .push(record);
    }

    /// Register a database, empty unless already seeded.
    pub fn add_database(&self, database_id: &str, title: Option<&str>) {
        self.databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(database_id.to_string())
            .or_default();
        if let Some(title) = title {
            self.titles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(database_id.to_string(), title.to_string());
        }
    }

    /// Mark a record archived, as the store's own lifecycle would.
    pub fn archive(&self, record_id: &str) -> bool {
        let mut dbs = self.databases.lock().unwrap_or_else(PoisonError::into_inner);
        dbs.values_mut()
            .flat_map(|rows| rows.iter_mut())
            .find(|r| r.id == record_id)
            .map(|r| r.archived = true)
            .is_some()
    }

    /// Snapshot of one database, in insertion order.
    pub fn records(&self, database_id: &str) -> Vec<StoredRecord> {
        self.databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(database_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn record(&self, record_id: &str) -> Option<StoredRecord> {
        self.databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .flat_map(|rows| rows.iter())
            .find(|r| r.id == record_id)
            .cloned()
    }

    pub fn databases(&self) -> BTreeMap<String, Vec<StoredRecord>> {
        self.databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every create/update performed through the [`RecordStore`] trait.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Let `successes` calls of `op` through, then fail every later one.
    pub fn fail_after(&self, op: StoreOp, successes: usize) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(Failure {
            op,
            remaining_successes: successes,
        });
    }

    fn journal(&self, op: StoreOp, record_id: &str, properties: &PropertySet) {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(WriteRecord {
                op,
                record_id: record_id.to_string(),
                properties: properties.clone(),
            });
    }

    fn allocate_id(&self) -> String {
        let mut next = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        *next += 1;
        format!("rec-{}-{}", *next, uuid::Uuid::new_v4().simple())
    }
}

impl RecordStore for MemoryRecordStore {
    fn query(&self, database_id: &str, query: &Query) -> Result<Vec<StoredRecord>> {
        check_failure(&self.failure, StoreOp::Query, "memory")?;
        let mut rows: Vec<StoredRecord> = self
            .records(database_id)
            .into_iter()
            .filter(|r| query.filter.as_ref().map_or(true, |f| matches_filter(f, r)))
            .collect();

        if let Some(property) = &query.sort_ascending {
            rows.sort_by(|a, b| compare_property(a.properties.get(property), b.properties.get(property)));
        }
        Ok(rows)
    }

    fn create(&self, database_id: &str, properties: &PropertySet) -> Result<String> {
        check_failure(&self.failure, StoreOp::Create, "memory")?;
        let id = self.allocate_id();
        self.seed(database_id, StoredRecord::new(id.clone(), properties.clone()));
        self.journal(StoreOp::Create, &id, properties);
        Ok(id)
    }

    fn update(&self, record_id: &str, properties: &PropertySet) -> Result<()> {
        check_failure(&self.failure, StoreOp::Update, "memory")?;
        {
            let mut dbs = self.databases.lock().unwrap_or_else(PoisonError::into_inner);
            let record = dbs
                .values_mut()
                .flat_map(|rows| rows.iter_mut())
                .find(|r| r.id == record_id)
                .ok_or_else(|| {
                    CoreError::integration("memory", format!("no record with id {record_id}"))
                })?;
            for (name, value) in properties {
                record.properties.insert(name.clone(), value.clone());
            }
        }
        self.journal(StoreOp::Update, record_id, properties);
        Ok(())
    }

    fn retrieve_database(&self, database_id: &str) -> Result<DatabaseInfo> {
        check_failure(&self.failure, StoreOp::RetrieveDatabase, "memory")?;
        let known = self
            .databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(database_id);
        if !known {
            return Err(CoreError::integration(
                "memory",
                format!("no database with id {database_id}"),
            ));
        }
        let title = self
            .titles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(database_id)
            .cloned();
        Ok(DatabaseInfo {
            id: database_id.to_string(),
            title,
        })
    }
}

/// Evaluate a filter against one record.
pub fn matches_filter(filter: &Filter, record: &StoredRecord) -> bool {
    match filter {
        Filter::Equals { property, value } => {
            let actual = record.properties.get(property);
            match value {
                PropertyValue::Checkbox(expected) => record.checkbox(property) == *expected,
                PropertyValue::Number(expected) => record.number(property) == *expected,
                PropertyValue::Relation(ids) => ids
                    .first()
                    .map_or(false, |id| record.relation(property).contains(id)),
                other => match (actual.and_then(PropertyValue::as_text), other.as_text()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            }
        }
        Filter::IsEmpty { property, .. } => record
            .properties
            .get(property)
            .map_or(true, PropertyValue::is_empty),
        Filter::OnOrAfter { property, date } => {
            let bound = EventTime::new(date.as_str()).instant();
            let actual = record.text(property).and_then(|t| EventTime::new(t).instant());
            match (actual, bound) {
                (Some(actual), Some(bound)) => actual >= bound,
                _ => false,
            }
        }
        Filter::And(conditions) => conditions.iter().all(|c| matches_filter(c, record)),
    }
}

/// Ascending order; missing values sort last.
fn compare_property(a: Option<&PropertyValue>, b: Option<&PropertyValue>) -> Ordering {
    let key = |v: Option<&PropertyValue>| {
        v.and_then(PropertyValue::as_text).map(|t| {
            let instant = EventTime::new(t).instant();
            (instant, t.to_string())
        })
    };
    match (key(a), key(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// `timeMin` bounds an event's end, exclusively, so events already in
/// progress are listed. Events without an end fall back to their start.
fn still_running(event: &RemoteEvent, time_min: DateTime<Utc>) -> bool {
    let instant = |t: &Option<EventTime>| t.as_ref().and_then(EventTime::instant);
    match (instant(&event.end), instant(&event.start)) {
        (Some(end), _) => end > time_min,
        (None, Some(start)) => start >= time_min,
        (None, None) => true,
    }
}

#[derive(Debug, Default)]
pub struct MemoryEventSource {
    calendars: Mutex<BTreeMap<String, Vec<RemoteEvent>>>,
    failure: Mutex<Option<Failure>>,
    queries: Mutex<Vec<EventQuery>>,
}

impl MemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_calendars(calendars: BTreeMap<String, Vec<RemoteEvent>>) -> Self {
        Self {
            calendars: Mutex::new(calendars),
            ..Self::default()
        }
    }

    pub fn seed(&self, calendar_id: &str, event: RemoteEvent) {
        self.calendars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(calendar_id.to_string())
            .or_default()
            .push(event);
    }

    pub fn events(&self, calendar_id: &str) -> Vec<RemoteEvent> {
        self.calendars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(calendar_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calendars(&self) -> BTreeMap<String, Vec<RemoteEvent>> {
        self.calendars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Listing requests received, in order.
    pub fn queries(&self) -> Vec<EventQuery> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn fail_after(&self, op: StoreOp, successes: usize) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(Failure {
            op,
            remaining_successes: successes,
        });
    }
}

impl EventSource for MemoryEventSource {
    fn list_events(&self, query: &EventQuery) -> Result<Vec<RemoteEvent>> {
        check_failure(&self.failure, StoreOp::ListEvents, "memory")?;
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());

        let mut events: Vec<RemoteEvent> = self
            .events(&query.calendar_id)
            .into_iter()
            .filter(|e| still_running(e, query.time_min))
            .collect();
        events.sort_by_key(|e| e.start.as_ref().and_then(EventTime::instant));
        events.truncate(query.max_results);
        Ok(events)
    }

    fn insert_event(&self, calendar_id: &str, event: &NewEvent) -> Result<String> {
        check_failure(&self.failure, StoreOp::InsertEvent, "memory")?;
        let id = format!("evt{}", uuid::Uuid::new_v4().simple());
        self.seed(
            calendar_id,
            RemoteEvent {
                id: Some(id.clone()),
                summary: Some(event.summary.clone()),
                start: Some(event.start.clone()),
                end: Some(event.end.clone()),
            },
        );
        Ok(id)
    }
}
