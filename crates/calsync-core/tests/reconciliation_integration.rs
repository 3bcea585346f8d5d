//! Integration tests for pull/push reconciliation through the service context,
//! backed by the in-memory record store and event source.

use std::collections::HashSet;
use std::sync::Arc;

use calsync_core::integrations::{
    EventTime, MemoryEventSource, MemoryRecordStore, PropertySet, PropertyValue, RemoteEvent,
    StoreOp, StoredRecord,
};
use calsync_core::{Config, DatabaseIds, PassResult, ServiceContext};
use chrono::{DateTime, TimeZone, Utc};

const SCHEDULE: &str = "schedule-db";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

fn config() -> Config {
    Config::from_toml(
        r#"
        [[bindings]]
        context = "Work"
        type = "Meeting"
        calendar_id = "meetings@group"

        [[bindings]]
        context = "Personal"
        type = "Events"
        calendar_id = "me@example.com"
        label = "Personal"

        [schedule_fields]
        source = "Calendar Source"
        "#,
    )
    .unwrap()
}

fn context(store: &Arc<MemoryRecordStore>, source: &Arc<MemoryEventSource>) -> ServiceContext {
    ServiceContext::with_backends(
        config(),
        store.clone(),
        Some(source.clone()),
        DatabaseIds {
            schedule: SCHEDULE.into(),
            tasks: None,
            time_blocks: None,
        },
    )
    .unwrap()
}

fn event(id: &str, summary: &str, start: &str, end: Option<&str>) -> RemoteEvent {
    RemoteEvent {
        id: Some(id.into()),
        summary: Some(summary.into()),
        start: Some(EventTime::new(start)),
        end: end.map(EventTime::new),
    }
}

fn local_record(title: Option<&str>, start: Option<&str>, context: &str, kind: &str) -> PropertySet {
    let mut props = PropertySet::new();
    if let Some(title) = title {
        props.insert("Name".into(), PropertyValue::Title(title.into()));
    }
    if let Some(start) = start {
        props.insert("Start Time".into(), PropertyValue::Date(Some(start.into())));
    }
    props.insert("Context".into(), PropertyValue::Select(Some(context.into())));
    props.insert("Type".into(), PropertyValue::Select(Some(kind.into())));
    props.insert("GCal ID".into(), PropertyValue::RichText(String::new()));
    props
}

fn live_foreign_ids(store: &MemoryRecordStore) -> Vec<String> {
    store
        .records(SCHEDULE)
        .into_iter()
        .filter(|r| !r.archived)
        .filter_map(|r| r.text("GCal ID").map(String::from))
        .collect()
}

fn seeded_source() -> Arc<MemoryEventSource> {
    let source = Arc::new(MemoryEventSource::new());
    source.seed(
        "meetings@group",
        event("g1", "Standup", "2024-01-02T09:00:00Z", Some("2024-01-02T09:15:00Z")),
    );
    source.seed(
        "meetings@group",
        event("g2", "Review", "2024-01-03T14:00:00Z", Some("2024-01-03T15:00:00Z")),
    );
    source.seed("me@example.com", event("g3", "Holiday", "2024-01-05", Some("2024-01-06")));
    // already started; outside the listing window
    source.seed("me@example.com", event("g0", "Old", "2023-12-31T09:00:00Z", None));
    source
}

#[test]
fn test_pull_is_idempotent() {
    let store = Arc::new(MemoryRecordStore::new());
    let source = seeded_source();
    let ctx = context(&store, &source);

    match ctx.pull_at(now()) {
        PassResult::Success(report) => {
            assert_eq!(report.added, 3);
            assert_eq!(report.updated, 0);
        }
        other => panic!("first pull failed: {other:?}"),
    }
    for _ in 0..3 {
        match ctx.pull_at(now()) {
            PassResult::Success(report) => {
                assert_eq!(report.added, 0);
                assert_eq!(report.updated, 3);
            }
            other => panic!("repeat pull failed: {other:?}"),
        }
    }
    assert_eq!(store.records(SCHEDULE).len(), 3);
}

#[test]
fn test_pulled_records_are_labelled_from_bindings() {
    let store = Arc::new(MemoryRecordStore::new());
    let source = seeded_source();
    context(&store, &source).pull_at(now());

    let holiday = store
        .records(SCHEDULE)
        .into_iter()
        .find(|r| r.text("GCal ID") == Some("g3"))
        .unwrap();
    assert_eq!(holiday.text("Context"), Some("Personal"));
    assert_eq!(holiday.text("Type"), Some("Events"));
    assert_eq!(holiday.text("Calendar Source"), Some("Personal"));
    assert_eq!(holiday.number("Duration"), Some(1440.0));

    let standup = store
        .records(SCHEDULE)
        .into_iter()
        .find(|r| r.text("GCal ID") == Some("g1"))
        .unwrap();
    assert_eq!(standup.text("Calendar Source"), Some("meetings@group"));
    assert_eq!(standup.number("Duration"), Some(15.0));
}

#[test]
fn test_dedup_survives_archived_copies() {
    let store = Arc::new(MemoryRecordStore::new());
    let source = seeded_source();
    let ctx = context(&store, &source);

    ctx.pull_at(now());
    let g1 = store
        .records(SCHEDULE)
        .into_iter()
        .find(|r| r.text("GCal ID") == Some("g1"))
        .unwrap();
    assert!(store.archive(&g1.id));

    // the archived mirror is not rematched; a fresh live record replaces it
    match ctx.pull_at(now()) {
        PassResult::Success(report) => assert_eq!((report.added, report.updated), (1, 2)),
        other => panic!("pull failed: {other:?}"),
    }
    ctx.pull_at(now());

    let ids = live_foreign_ids(&store);
    let distinct: HashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), distinct.len());
    assert_eq!(ids.len(), 3);
}

#[test]
fn test_update_preserves_duration_when_unknown() {
    let store = Arc::new(MemoryRecordStore::new());
    let source = Arc::new(MemoryEventSource::new());
    source.seed(
        "meetings@group",
        event("g1", "Standup", "2024-01-02T09:00:00Z", Some("2024-01-02T09:30:00Z")),
    );
    let ctx = context(&store, &source);
    ctx.pull_at(now());

    let refreshed = Arc::new(MemoryEventSource::new());
    refreshed.seed(
        "meetings@group",
        event("g1", "Standup (moved)", "2024-01-02T09:00:00Z", Some("whenever")),
    );
    context(&store, &refreshed).pull_at(now());

    let rows = store.records(SCHEDULE);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text("Name"), Some("Standup (moved)"));
    assert_eq!(rows[0].number("Duration"), Some(30.0));
}

#[test]
fn test_push_skips_and_continues() {
    let store = Arc::new(MemoryRecordStore::new());
    let source = Arc::new(MemoryEventSource::new());
    store.seed(
        SCHEDULE,
        StoredRecord::new("unmapped", local_record(Some("Errand"), Some("2024-02-01T10:00:00Z"), "Personal", "Unmapped")),
    );
    store.seed(
        SCHEDULE,
        StoredRecord::new("no-start", local_record(Some("Call mum"), None, "Personal", "Events")),
    );
    store.seed(
        SCHEDULE,
        StoredRecord::new("no-title", local_record(None, Some("2024-02-02T10:00:00Z"), "Work", "Meeting")),
    );
    store.seed(
        SCHEDULE,
        StoredRecord::new("ok", local_record(Some("Dentist"), Some("2024-02-03T10:00:00Z"), "Personal", "Events")),
    );
    let ctx = context(&store, &source);

    match ctx.push() {
        PassResult::Success(report) => assert_eq!(report.pushed, 1),
        other => panic!("push failed: {other:?}"),
    }
    assert_eq!(source.events("me@example.com").len(), 1);
    assert!(source.events("meetings@group").is_empty());
    for skipped in ["unmapped", "no-start", "no-title"] {
        assert_eq!(store.record(skipped).unwrap().text("GCal ID"), None);
    }
}

#[test]
fn test_push_then_pull_does_not_duplicate() {
    let store = Arc::new(MemoryRecordStore::new());
    let source = Arc::new(MemoryEventSource::new());
    store.seed(
        SCHEDULE,
        StoredRecord::new("local", local_record(Some("Planning"), Some("2024-02-01T10:00:00Z"), "Work", "Meeting")),
    );
    let ctx = context(&store, &source);

    let report = ctx.sync_at(now());
    assert!(report.is_success());
    assert_eq!(report.push.report().map(|r| r.pushed), Some(1));

    // the pushed event now comes back on pull and matches its origin record
    match ctx.pull_at(now()) {
        PassResult::Success(report) => assert_eq!((report.added, report.updated), (0, 1)),
        other => panic!("pull failed: {other:?}"),
    }
    assert_eq!(store.records(SCHEDULE).len(), 1);

    // nothing left to push
    assert_eq!(ctx.push().report().map(|r| r.pushed), Some(0));
}

#[test]
fn test_write_back_failure_aborts_push() {
    let store = Arc::new(MemoryRecordStore::new());
    let source = Arc::new(MemoryEventSource::new());
    store.seed(
        SCHEDULE,
        StoredRecord::new("a", local_record(Some("A"), Some("2024-02-01T10:00:00Z"), "Work", "Meeting")),
    );
    store.seed(
        SCHEDULE,
        StoredRecord::new("b", local_record(Some("B"), Some("2024-02-02T10:00:00Z"), "Work", "Meeting")),
    );
    store.fail_after(StoreOp::Update, 0);
    let ctx = context(&store, &source);

    let result = ctx.push();
    assert!(result.error_message().is_some());
    // the event was inserted before the write-back failed; the second record
    // was never reached
    assert_eq!(source.events("meetings@group").len(), 1);
    assert_eq!(store.record("a").unwrap().text("GCal ID"), None);
}

#[test]
fn test_listing_fault_reports_error() {
    let store = Arc::new(MemoryRecordStore::new());
    let source = seeded_source();
    source.fail_after(StoreOp::ListEvents, 1);
    let ctx = context(&store, &source);

    let result = ctx.pull_at(now());
    assert!(result.report().is_none());
    assert!(result.error_message().unwrap().contains("injected failure"));
    // records from the first calendar were committed before the fault
    assert_eq!(store.records(SCHEDULE).len(), 2);
}
