//! Work items and time blocks read from the record store.
//!
//! A work item is eligible when its status is the pending label and
//! auto-scheduling is ticked. A time block is eligible when it starts now or
//! later and has no linked item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{BlockFields, TaskFields};
use crate::integrations::{
    EventTime, Filter, PropertyKind, PropertySet, PropertyValue, Query, StoredRecord,
};

/// Priority label of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Routine,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Exact label match; anything else is unknown.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Routine" => Some(Priority::Routine),
            "High" => Some(Priority::High),
            "Medium" => Some(Priority::Medium),
            "Low" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Routine => "Routine",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

/// An eligible work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub item_id: String,
    /// Raw fixed time; resolved to an instant during assignment.
    pub fixed_time: Option<EventTime>,
    pub priority: Option<Priority>,
    /// Priority label as stored, kept for reporting unknown labels.
    pub priority_label: Option<String>,
}

impl WorkItem {
    pub fn new(item_id: &str, priority: Option<Priority>) -> Self {
        Self {
            item_id: item_id.to_string(),
            fixed_time: None,
            priority,
            priority_label: priority.map(|p| p.label().to_string()),
        }
    }

    pub fn with_fixed_time(mut self, fixed_time: impl Into<EventTime>) -> Self {
        self.fixed_time = Some(fixed_time.into());
        self
    }

    pub fn from_record(record: &StoredRecord, fields: &TaskFields) -> Self {
        let label = record.text(&fields.priority).map(str::to_string);
        Self {
            item_id: record.id.clone(),
            fixed_time: record.text(&fields.fixed_time).map(EventTime::new),
            priority: label.as_deref().and_then(Priority::from_label),
            priority_label: label,
        }
    }
}

/// An eligible, unlinked time block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub block_id: String,
    pub start: DateTime<Utc>,
}

impl TimeBlock {
    pub fn new(block_id: &str, start: DateTime<Utc>) -> Self {
        Self {
            block_id: block_id.to_string(),
            start,
        }
    }

    /// `None` when the start is missing or unparsable, or the block is
    /// already linked.
    pub fn from_record(record: &StoredRecord, fields: &BlockFields) -> Option<Self> {
        if !record.relation(&fields.linked_item).is_empty() {
            return None;
        }
        let start = record.text(&fields.start).and_then(|t| EventTime::new(t).instant())?;
        Some(Self {
            block_id: record.id.clone(),
            start,
        })
    }
}

/// Pending, auto-schedulable items.
pub fn eligible_items_query(fields: &TaskFields) -> Query {
    Query::new().filter(Filter::And(vec![
        Filter::equals(
            &fields.status,
            PropertyValue::Select(Some(fields.pending_status.clone())),
        ),
        Filter::equals(&fields.auto_schedule, PropertyValue::Checkbox(true)),
    ]))
}

/// Unlinked blocks starting at or after `now`, earliest first.
pub fn eligible_blocks_query(fields: &BlockFields, now: DateTime<Utc>) -> Query {
    Query::new()
        .filter(Filter::And(vec![
            Filter::on_or_after(&fields.start, now),
            Filter::is_empty(&fields.linked_item, PropertyKind::Relation),
        ]))
        .sort_ascending(&fields.start)
}

/// Link a block to an item and mark it auto-filled, in one update.
pub fn link_update(fields: &BlockFields, item_id: &str) -> PropertySet {
    let mut props = PropertySet::new();
    props.insert(
        fields.linked_item.clone(),
        PropertyValue::Relation(vec![item_id.to_string()]),
    );
    props.insert(fields.auto_filled.clone(), PropertyValue::Checkbox(true));
    props
}
