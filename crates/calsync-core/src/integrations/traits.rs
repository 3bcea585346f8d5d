use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{DatabaseInfo, NewEvent, PropertyKind, PropertySet, PropertyValue, RemoteEvent, StoredRecord};
use crate::error::Result;

/// Structured database holding schedule records, work items and time blocks.
///
/// Implementations are blocking from the caller's point of view.
pub trait RecordStore {
    /// Run a filtered, optionally sorted query. Archived rows are returned
    /// with their `archived` flag set; callers decide what to do with them.
    fn query(&self, database_id: &str, query: &Query) -> Result<Vec<StoredRecord>>;

    /// Create a row under `database_id`, returning the new record id.
    fn create(&self, database_id: &str, properties: &PropertySet) -> Result<String>;

    /// Partial update: properties absent from `properties` are left untouched.
    fn update(&self, record_id: &str, properties: &PropertySet) -> Result<()>;

    /// Fetch database metadata; fails when the database is unreachable.
    fn retrieve_database(&self, database_id: &str) -> Result<DatabaseInfo>;
}

/// Calendar provider.
pub trait EventSource {
    fn list_events(&self, query: &EventQuery) -> Result<Vec<RemoteEvent>>;

    /// Insert an event, returning the provider-assigned identifier.
    fn insert_event(&self, calendar_id: &str, event: &NewEvent) -> Result<String>;
}

/// Record store filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Equals { property: String, value: PropertyValue },
    IsEmpty { property: String, kind: PropertyKind },
    OnOrAfter { property: String, date: String },
    And(Vec<Filter>),
}

impl Filter {
    pub fn equals(property: &str, value: PropertyValue) -> Self {
        Filter::Equals {
            property: property.to_string(),
            value,
        }
    }

    pub fn is_empty(property: &str, kind: PropertyKind) -> Self {
        Filter::IsEmpty {
            property: property.to_string(),
            kind,
        }
    }

    pub fn on_or_after(property: &str, at: DateTime<Utc>) -> Self {
        Filter::OnOrAfter {
            property: property.to_string(),
            date: at.to_rfc3339(),
        }
    }
}

/// A record store query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filter: Option<Filter>,
    /// Property to sort ascending by.
    pub sort_ascending: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort_ascending(mut self, property: &str) -> Self {
        self.sort_ascending = Some(property.to_string());
        self
    }
}

/// Event listing window on one calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub calendar_id: String,
    pub time_min: DateTime<Utc>,
    pub max_results: usize,
    /// Ask the provider to expand recurring events into single occurrences.
    pub single_events: bool,
}

impl EventQuery {
    /// Upcoming single occurrences, ordered by start time.
    pub fn upcoming(calendar_id: &str, time_min: DateTime<Utc>, max_results: usize) -> Self {
        Self {
            calendar_id: calendar_id.to_string(),
            time_min,
            max_results,
            single_events: true,
        }
    }
}
