//! Field projection between calendar events and schedule records.

use crate::config::ScheduleFields;
use crate::error::IncompleteRecordError;
use crate::integrations::{EventTime, PropertySet, PropertyValue, StoredRecord};
use crate::sync::types::{Event, ProjectedEvent, ScheduleRecord};

/// Maps events onto schedule-database properties and back, using the
/// configured property names.
#[derive(Debug, Clone)]
pub struct FieldProjector {
    fields: ScheduleFields,
}

impl FieldProjector {
    pub fn new(fields: ScheduleFields) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &ScheduleFields {
        &self.fields
    }

    /// Full property set for a pulled event.
    ///
    /// Duration is omitted when unknown so a previously computed value is
    /// never overwritten with a sentinel.
    pub fn to_properties(&self, event: &Event) -> PropertySet {
        let f = &self.fields;
        let mut props = PropertySet::new();
        props.insert(f.title.clone(), PropertyValue::Title(event.title.clone()));
        props.insert(
            f.start.clone(),
            PropertyValue::Date(Some(event.start.as_str().to_string())),
        );
        props.insert(
            f.end.clone(),
            PropertyValue::Date(event.end.as_ref().map(|e| e.as_str().to_string())),
        );
        props.insert(
            f.foreign_id.clone(),
            PropertyValue::RichText(event.foreign_id.clone()),
        );
        props.insert(
            f.context.clone(),
            PropertyValue::Select(Some(event.context.clone())),
        );
        props.insert(f.kind.clone(), PropertyValue::Select(Some(event.kind.clone())));
        if let Some(minutes) = event.duration_minutes() {
            props.insert(f.duration.clone(), PropertyValue::Number(Some(minutes as f64)));
        }
        if let Some(source) = &f.source {
            props.insert(
                source.clone(),
                PropertyValue::RichText(event.source_label.clone()),
            );
        }
        props
    }

    /// Single-field update writing the foreign id back onto a record.
    pub fn foreign_id_update(&self, foreign_id: &str) -> PropertySet {
        let mut props = PropertySet::new();
        props.insert(
            self.fields.foreign_id.clone(),
            PropertyValue::RichText(foreign_id.to_string()),
        );
        props
    }

    /// Read a stored row through the configured property names.
    pub fn record_from_stored(&self, stored: &StoredRecord) -> ScheduleRecord {
        let f = &self.fields;
        let text = |name: &str| stored.text(name).map(str::to_string);
        ScheduleRecord {
            record_id: stored.id.clone(),
            title: text(&f.title),
            start: stored.text(&f.start).map(EventTime::new),
            end: stored.text(&f.end).map(EventTime::new),
            foreign_id: text(&f.foreign_id),
            context: text(&f.context),
            kind: text(&f.kind),
            duration_minutes: stored.number(&f.duration).map(|n| n.round() as i64),
            archived: stored.archived,
        }
    }

    /// Inverse projection for the push pass. Fails naming the first missing
    /// field among title, start, context and type; a missing end defaults to
    /// the start (zero-length event).
    pub fn to_event(&self, record: &ScheduleRecord) -> Result<ProjectedEvent, IncompleteRecordError> {
        let missing = |field: &'static str| IncompleteRecordError {
            record_id: record.record_id.clone(),
            field,
        };
        let title = record.title.clone().ok_or_else(|| missing("title"))?;
        let start = record.start.clone().ok_or_else(|| missing("start"))?;
        let context = record.context.clone().ok_or_else(|| missing("context"))?;
        let kind = record.kind.clone().ok_or_else(|| missing("type"))?;
        let end = record.end.clone().unwrap_or_else(|| start.clone());
        Ok(ProjectedEvent {
            title,
            start,
            end,
            context,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projector() -> FieldProjector {
        FieldProjector::new(ScheduleFields::default())
    }

    fn event(end: Option<&str>) -> Event {
        Event {
            foreign_id: "g1".into(),
            title: "Focus".into(),
            start: EventTime::new("2024-01-01T09:00:00Z"),
            end: end.map(EventTime::new),
            source_label: "deep@group".into(),
            context: "Work".into(),
            kind: "Deep Work".into(),
        }
    }

    fn record() -> ScheduleRecord {
        ScheduleRecord {
            record_id: "r1".into(),
            title: Some("Dentist".into()),
            start: Some(EventTime::new("2024-02-01T10:00:00Z")),
            end: None,
            foreign_id: None,
            context: Some("Personal".into()),
            kind: Some("Events".into()),
            duration_minutes: None,
            archived: false,
        }
    }

    #[test]
    fn test_to_properties_writes_duration() {
        let props = projector().to_properties(&event(Some("2024-01-01T09:45:00Z")));
        assert_eq!(props.get("Duration"), Some(&PropertyValue::Number(Some(45.0))));
        assert_eq!(props.get("GCal ID"), Some(&PropertyValue::RichText("g1".into())));
        assert_eq!(
            props.get("Type"),
            Some(&PropertyValue::Select(Some("Deep Work".into())))
        );
    }

    #[test]
    fn test_to_properties_omits_unknown_duration() {
        let props = projector().to_properties(&event(Some("not a time")));
        assert!(!props.contains_key("Duration"));
        assert_eq!(
            props.get("End Time"),
            Some(&PropertyValue::Date(Some("not a time".into())))
        );
    }

    #[test]
    fn test_source_label_written_when_configured() {
        let fields = ScheduleFields {
            source: Some("Calendar Source".into()),
            ..ScheduleFields::default()
        };
        let props = FieldProjector::new(fields).to_properties(&event(None));
        assert_eq!(
            props.get("Calendar Source"),
            Some(&PropertyValue::RichText("deep@group".into()))
        );
        assert_eq!(props.get("End Time"), Some(&PropertyValue::Date(None)));
    }

    #[test]
    fn test_to_event_defaults_end_to_start() {
        let projected = projector().to_event(&record()).unwrap();
        assert_eq!(projected.end, projected.start);
        assert_eq!(projected.kind, "Events");
    }

    #[test]
    fn test_to_event_names_first_missing_field() {
        let mut r = record();
        r.start = None;
        r.context = None;
        let err = projector().to_event(&r).unwrap_err();
        assert_eq!(err.field, "start");
        assert_eq!(err.record_id, "r1");

        let mut r = record();
        r.kind = None;
        assert_eq!(projector().to_event(&r).unwrap_err().field, "type");
    }

    #[test]
    fn test_record_from_stored_reads_configured_names() {
        let stored = StoredRecord::new("r9", projector().to_properties(&event(Some("2024-01-01T10:00:00Z"))));
        let record = projector().record_from_stored(&stored);
        assert_eq!(record.title.as_deref(), Some("Focus"));
        assert_eq!(record.foreign_id.as_deref(), Some("g1"));
        assert_eq!(record.duration_minutes, Some(60));
        assert!(!record.archived);
    }

    #[test]
    fn test_foreign_id_update_is_single_field() {
        let props = projector().foreign_id_update("evt1");
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("GCal ID"), Some(&PropertyValue::RichText("evt1".into())));
    }
}
