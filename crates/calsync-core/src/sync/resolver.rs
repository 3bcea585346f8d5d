//! Foreign-id to schedule-record identity resolution.

use tracing::warn;

use crate::error::Result;
use crate::integrations::{Filter, PropertyValue, Query, RecordStore};
use crate::sync::projector::FieldProjector;
use crate::sync::types::ScheduleRecord;

/// Finds the local record mirroring a foreign event.
///
/// Archived rows never match. When several live rows share a foreign id the
/// first one returned by the store wins and the rest are logged.
pub struct IdentityResolver<'a> {
    store: &'a dyn RecordStore,
    database_id: &'a str,
    projector: &'a FieldProjector,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(store: &'a dyn RecordStore, database_id: &'a str, projector: &'a FieldProjector) -> Self {
        Self {
            store,
            database_id,
            projector,
        }
    }

    pub fn resolve(&self, foreign_id: &str) -> Result<Option<ScheduleRecord>> {
        if foreign_id.trim().is_empty() {
            return Ok(None);
        }
        let property = &self.projector.fields().foreign_id;
        let query = Query::new().filter(Filter::equals(
            property,
            PropertyValue::RichText(foreign_id.to_string()),
        ));

        let mut live = self
            .store
            .query(self.database_id, &query)?
            .into_iter()
            .filter(|r| !r.archived);

        let Some(first) = live.next() else {
            return Ok(None);
        };
        let extra: Vec<String> = live.map(|r| r.id).collect();
        if !extra.is_empty() {
            warn!(
                foreign_id,
                kept = %first.id,
                duplicates = ?extra,
                "multiple live records share a foreign id"
            );
        }
        Ok(Some(self.projector.record_from_stored(&first)))
    }
}
