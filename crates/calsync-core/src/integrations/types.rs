//! Value types exchanged with the record store and the event source.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single typed property value in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Date(Option<String>),
    Select(Option<String>),
    Number(Option<f64>),
    Checkbox(bool),
    Relation(Vec<String>),
}

impl PropertyValue {
    /// Textual content of the property, `None` when empty or non-textual.
    pub fn as_text(&self) -> Option<&str> {
        let text = match self {
            PropertyValue::Title(s) | PropertyValue::RichText(s) => Some(s.as_str()),
            PropertyValue::Date(d) => d.as_deref(),
            PropertyValue::Select(s) => s.as_deref(),
            _ => None,
        };
        text.filter(|s| !s.trim().is_empty())
    }

    /// Whether the property holds no value at all.
    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Title(s) | PropertyValue::RichText(s) => s.trim().is_empty(),
            PropertyValue::Date(d) | PropertyValue::Select(d) => d.is_none(),
            PropertyValue::Number(n) => n.is_none(),
            PropertyValue::Checkbox(_) => false,
            PropertyValue::Relation(ids) => ids.is_empty(),
        }
    }

    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Title(_) => PropertyKind::Title,
            PropertyValue::RichText(_) => PropertyKind::RichText,
            PropertyValue::Date(_) => PropertyKind::Date,
            PropertyValue::Select(_) => PropertyKind::Select,
            PropertyValue::Number(_) => PropertyKind::Number,
            PropertyValue::Checkbox(_) => PropertyKind::Checkbox,
            PropertyValue::Relation(_) => PropertyKind::Relation,
        }
    }
}

/// Property type tag, used where a filter names a type without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Title,
    RichText,
    Date,
    Select,
    Number,
    Checkbox,
    Relation,
}

impl PropertyKind {
    /// Wire name of the type as the record store spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Title => "title",
            PropertyKind::RichText => "rich_text",
            PropertyKind::Date => "date",
            PropertyKind::Select => "select",
            PropertyKind::Number => "number",
            PropertyKind::Checkbox => "checkbox",
            PropertyKind::Relation => "relation",
        }
    }
}

/// Property name -> value. Partial on update: absent names are left untouched.
pub type PropertySet = BTreeMap<String, PropertyValue>;

/// A row as returned by a record store query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: PropertySet,
}

impl StoredRecord {
    pub fn new(id: impl Into<String>, properties: PropertySet) -> Self {
        Self {
            id: id.into(),
            archived: false,
            properties,
        }
    }

    /// Non-empty text of a title, rich text, select or date property.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_text)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.properties.get(name) {
            Some(PropertyValue::Number(n)) => *n,
            _ => None,
        }
    }

    pub fn checkbox(&self, name: &str) -> bool {
        matches!(self.properties.get(name), Some(PropertyValue::Checkbox(true)))
    }

    pub fn relation(&self, name: &str) -> &[String] {
        match self.properties.get(name) {
            Some(PropertyValue::Relation(ids)) => ids,
            _ => &[],
        }
    }
}

/// Metadata of a record-store database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// A date or date-time exactly as the external service spelled it.
///
/// The raw form is preserved so it can be written back verbatim; instants are
/// derived on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTime(String);

impl EventTime {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// All-day value (`YYYY-MM-DD`) without a time component.
    pub fn is_date_only(&self) -> bool {
        self.date().is_some()
    }

    /// The calendar date of an all-day value; `None` for timed values.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.0.trim(), "%Y-%m-%d").ok()
    }

    /// Resolve to an instant. Date-only values resolve to midnight UTC and
    /// naive date-times are read as UTC. `None` when unparsable.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

impl From<DateTime<Utc>> for EventTime {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.to_rfc3339())
    }
}

impl From<NaiveDate> for EventTime {
    fn from(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }
}

impl std::fmt::Display for EventTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An event as listed by the event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
}

/// Body of an event insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
}

impl NewEvent {
    /// Build an insertion body the calendar accepts: both bounds of one kind
    /// and a non-empty range.
    ///
    /// All-day ends are exclusive, so an all-day end equal to its start moves
    /// to the following day. A date-only bound paired with a timed one is sent
    /// as midnight UTC. `None` when a bound is unparsable or the end precedes
    /// the start.
    pub fn with_bounds(summary: &str, start: &EventTime, end: &EventTime) -> Option<Self> {
        let (start, end) = match (start.date(), end.date()) {
            (Some(s), Some(e)) if e < s => return None,
            (Some(s), Some(e)) => {
                let e = if e == s { s.succ_opt()? } else { e };
                (EventTime::from(s), EventTime::from(e))
            }
            _ => {
                let (s, e) = (start.instant()?, end.instant()?);
                if e < s {
                    return None;
                }
                (as_timed(start, s), as_timed(end, e))
            }
        };
        Some(Self {
            summary: summary.to_string(),
            start,
            end,
        })
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_date_only() && self.end.is_date_only()
    }
}

fn as_timed(raw: &EventTime, instant: DateTime<Utc>) -> EventTime {
    if raw.is_date_only() {
        EventTime::from(instant)
    } else {
        raw.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_time_rfc3339_with_offset() {
        let t = EventTime::new("2024-01-01T10:00:00+02:00");
        assert_eq!(
            t.instant(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap())
        );
        assert!(!t.is_date_only());
    }

    #[test]
    fn test_event_time_date_only_is_midnight_utc() {
        let t = EventTime::new("2024-03-05");
        assert!(t.is_date_only());
        assert_eq!(
            t.instant(),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_event_time_naive_is_utc() {
        let t = EventTime::new("2024-03-05T09:30:00");
        assert_eq!(
            t.instant(),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_event_time_garbage() {
        assert_eq!(EventTime::new("next tuesday").instant(), None);
    }

    #[test]
    fn test_property_text_ignores_blank() {
        assert_eq!(PropertyValue::RichText("  ".into()).as_text(), None);
        assert_eq!(PropertyValue::Select(Some("Work".into())).as_text(), Some("Work"));
        assert!(PropertyValue::Relation(vec![]).is_empty());
        assert!(!PropertyValue::Checkbox(false).is_empty());
    }

    #[test]
    fn test_stored_record_accessors() {
        let mut props = PropertySet::new();
        props.insert("Name".into(), PropertyValue::Title("Standup".into()));
        props.insert("Done".into(), PropertyValue::Checkbox(true));
        props.insert("Linked".into(), PropertyValue::Relation(vec!["t1".into()]));
        let record = StoredRecord::new("r1", props);

        assert_eq!(record.text("Name"), Some("Standup"));
        assert!(record.checkbox("Done"));
        assert!(!record.checkbox("Missing"));
        assert_eq!(record.relation("Linked"), ["t1".to_string()]);
        assert!(record.relation("Missing").is_empty());
    }

    #[test]
    fn test_new_event_all_day_without_end_spans_one_day() {
        let day = EventTime::new("2024-02-01");
        let event = NewEvent::with_bounds("Dentist", &day, &day).unwrap();
        assert!(event.is_all_day());
        assert_eq!(event.start, EventTime::new("2024-02-01"));
        assert_eq!(event.end, EventTime::new("2024-02-02"));
    }

    #[test]
    fn test_new_event_mixed_bounds_become_timed() {
        let event = NewEvent::with_bounds(
            "Trip",
            &EventTime::new("2024-02-01"),
            &EventTime::new("2024-02-01T18:00:00Z"),
        )
        .unwrap();
        assert!(!event.is_all_day());
        assert_eq!(event.start, EventTime::new("2024-02-01T00:00:00+00:00"));
        assert_eq!(event.end, EventTime::new("2024-02-01T18:00:00Z"));
    }

    #[test]
    fn test_new_event_rejects_inverted_or_unparsable_bounds() {
        let t = |raw: &str| EventTime::new(raw);
        assert!(NewEvent::with_bounds("x", &t("2024-02-03"), &t("2024-02-01")).is_none());
        assert!(NewEvent::with_bounds("x", &t("2024-02-01T10:00:00Z"), &t("2024-02-01T09:00:00Z")).is_none());
        assert!(NewEvent::with_bounds("x", &t("2024-02-01"), &t("soon")).is_none());
        // zero-length timed events are accepted
        assert!(NewEvent::with_bounds("x", &t("2024-02-01T10:00:00Z"), &t("2024-02-01T10:00:00Z")).is_some());
    }
}
