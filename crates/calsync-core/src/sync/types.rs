//! Core types for calendar/database reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::integrations::EventTime;

/// A foreign-origin event, labelled with its binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub foreign_id: String,
    pub title: String,
    pub start: EventTime,
    pub end: Option<EventTime>,
    pub source_label: String,
    pub context: String,
    pub kind: String,
}

impl Event {
    /// Whole minutes between start and end, rounded; `None` unless both
    /// bounds resolve to instants.
    pub fn duration_minutes(&self) -> Option<i64> {
        let start = self.start.instant()?;
        let end = self.end.as_ref()?.instant()?;
        let secs = (end - start).num_seconds();
        Some((secs as f64 / 60.0).round() as i64)
    }
}

/// A local schedule row mirroring an event, or awaiting push.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRecord {
    pub record_id: String,
    pub title: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub foreign_id: Option<String>,
    pub context: Option<String>,
    pub kind: Option<String>,
    pub duration_minutes: Option<i64>,
    pub archived: bool,
}

/// Inverse projection of a record, ready to insert into a calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedEvent {
    pub title: String,
    pub start: EventTime,
    pub end: EventTime,
    pub context: String,
    pub kind: String,
}

/// Pull pass counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullReport {
    pub added: usize,
    pub updated: usize,
}

/// Push pass counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReport {
    pub pushed: usize,
}

/// Outcome of one pass. A fault aborts the pass and only its message is
/// reported; counters gathered before the fault are dropped.
///
/// Serializes as `{"status": "success", ...counters}` or
/// `{"status": "error", "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassResult<T> {
    Success(T),
    Error { message: String },
}

impl<T> PassResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, PassResult::Success(_))
    }

    pub fn report(&self) -> Option<&T> {
        match self {
            PassResult::Success(report) => Some(report),
            PassResult::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            PassResult::Success(_) => None,
            PassResult::Error { message } => Some(message),
        }
    }
}

/// Combined pull-then-push outcome. The pull result is sent as `sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    #[serde(rename = "sync")]
    pub pull: PassResult<PullReport>,
    pub push: PassResult<PushReport>,
    pub timestamp: DateTime<Utc>,
}

impl SyncReport {
    /// Success only when both passes succeeded.
    pub fn is_success(&self) -> bool {
        self.pull.is_success() && self.push.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(start: &str, end: Option<&str>) -> Event {
        Event {
            foreign_id: "g1".into(),
            title: "Focus".into(),
            start: EventTime::new(start),
            end: end.map(EventTime::new),
            source_label: "cal".into(),
            context: "Work".into(),
            kind: "Deep Work".into(),
        }
    }

    #[test]
    fn test_duration_45_minutes() {
        let e = event("2024-01-01T09:00:00Z", Some("2024-01-01T09:45:00Z"));
        assert_eq!(e.duration_minutes(), Some(45));
    }

    #[test]
    fn test_duration_rounds_to_nearest_minute() {
        let e = event("2024-01-01T09:00:00Z", Some("2024-01-01T09:10:31Z"));
        assert_eq!(e.duration_minutes(), Some(11));
    }

    #[test]
    fn test_duration_all_day() {
        let e = event("2024-01-01", Some("2024-01-02"));
        assert_eq!(e.duration_minutes(), Some(1440));
    }

    #[test]
    fn test_duration_unknown() {
        assert_eq!(event("2024-01-01T09:00:00Z", Some("soon")).duration_minutes(), None);
        assert_eq!(event("2024-01-01T09:00:00Z", None).duration_minutes(), None);
    }

    #[test]
    fn test_pass_result_wire_shape() {
        let ok: PassResult<PullReport> = PassResult::Success(PullReport {
            added: 2,
            updated: 1,
        });
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({ "status": "success", "added": 2, "updated": 1 })
        );

        let err: PassResult<PushReport> = PassResult::Error {
            message: "boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "status": "error", "message": "boom" })
        );
        assert_eq!(err.error_message(), Some("boom"));
        assert!(err.report().is_none());
    }

    #[test]
    fn test_sync_report_wire_keys() {
        let report = SyncReport {
            pull: PassResult::Success(PullReport { added: 0, updated: 3 }),
            push: PassResult::Success(PushReport { pushed: 1 }),
            timestamp: "2024-01-01T08:00:00Z".parse().unwrap(),
        };
        let body = serde_json::to_value(&report).unwrap();
        assert_eq!(body["sync"], json!({ "status": "success", "added": 0, "updated": 3 }));
        assert_eq!(body["push"], json!({ "status": "success", "pushed": 1 }));
        assert!(body.get("pull").is_none());
        assert!(body["timestamp"].is_string());
    }
}
