//! Slot assignment: bind eligible work items to eligible time blocks.
//!
//! Items are bucketed once, in order:
//! - a fixed time puts the item in the fixed bucket
//! - otherwise a `Routine` priority puts it in the routine bucket
//! - otherwise it is graded by `High`, `Medium` or `Low`
//!
//! Fixed items (earliest first) take the first block starting within the
//! tolerance of their fixed time. Routine items, then High, Medium and Low
//! items, take blocks from the front of the remaining pool. Every block is
//! used at most once and the pass stops when either side runs out.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{BlockFields, TaskFields};
use crate::error::Result;
use crate::integrations::RecordStore;
use crate::schedule::{
    eligible_blocks_query, eligible_items_query, link_update, Priority, TimeBlock, WorkItem,
};
use crate::sync::PassResult;

/// Default fixed-time matching tolerance.
pub const DEFAULT_FIXED_TIME_TOLERANCE_SECS: i64 = 60;

/// Bucket an item was assigned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Fixed,
    Routine,
    High,
    Medium,
    Low,
}

/// Why an item stayed unbound this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscheduledReason {
    /// No remaining block starts within the tolerance of the fixed time.
    NoMatchingBlock,
    /// The shared pool ran out before this item's turn.
    PoolExhausted,
    /// No fixed time and a priority label outside the known set.
    UnknownPriority,
    /// The fixed time could not be parsed.
    InvalidFixedTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub item_id: String,
    pub block_id: String,
    pub bucket: Bucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unscheduled {
    pub item_id: String,
    pub reason: UnscheduledReason,
}

/// Outcome of [`plan`], before any write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePlan {
    pub assignments: Vec<Assignment>,
    pub unscheduled: Vec<Unscheduled>,
}

/// Summary of an applied scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub assigned: usize,
    pub unscheduled: Vec<Unscheduled>,
}

/// Compute assignments. `blocks` must be eligible and ordered earliest first;
/// that order is the pool order.
pub fn plan(items: &[WorkItem], blocks: Vec<TimeBlock>, tolerance: Duration) -> SchedulePlan {
    let mut result = SchedulePlan::default();
    let mut pool: VecDeque<TimeBlock> = blocks.into();

    let mut fixed: Vec<(DateTime<Utc>, &WorkItem)> = Vec::new();
    let mut routine: Vec<&WorkItem> = Vec::new();
    let mut high: Vec<&WorkItem> = Vec::new();
    let mut medium: Vec<&WorkItem> = Vec::new();
    let mut low: Vec<&WorkItem> = Vec::new();

    for item in items {
        if let Some(raw) = &item.fixed_time {
            match raw.instant() {
                Some(at) => fixed.push((at, item)),
                None => {
                    warn!(item = %item.item_id, fixed_time = %raw, "unparsable fixed time");
                    result.unscheduled.push(unscheduled(item, UnscheduledReason::InvalidFixedTime));
                }
            }
            continue;
        }
        match item.priority {
            Some(Priority::Routine) => routine.push(item),
            Some(Priority::High) => high.push(item),
            Some(Priority::Medium) => medium.push(item),
            Some(Priority::Low) => low.push(item),
            None => {
                warn!(item = %item.item_id, priority = ?item.priority_label, "unknown priority");
                result.unscheduled.push(unscheduled(item, UnscheduledReason::UnknownPriority));
            }
        }
    }

    fixed.sort_by_key(|(at, _)| *at);
    let tolerance_ms = tolerance.num_milliseconds();
    for (at, item) in fixed {
        let found = pool
            .iter()
            .position(|b| (b.start - at).num_milliseconds().abs() < tolerance_ms);
        match found.and_then(|idx| pool.remove(idx)) {
            Some(block) => result.assignments.push(assignment(item, block, Bucket::Fixed)),
            None => result
                .unscheduled
                .push(unscheduled(item, UnscheduledReason::NoMatchingBlock)),
        }
    }

    let tiers = [
        (Bucket::Routine, routine),
        (Bucket::High, high),
        (Bucket::Medium, medium),
        (Bucket::Low, low),
    ];
    for (bucket, tier) in tiers {
        for item in tier {
            match pool.pop_front() {
                Some(block) => result.assignments.push(assignment(item, block, bucket)),
                None => result
                    .unscheduled
                    .push(unscheduled(item, UnscheduledReason::PoolExhausted)),
            }
        }
    }

    result
}

fn assignment(item: &WorkItem, block: TimeBlock, bucket: Bucket) -> Assignment {
    Assignment {
        item_id: item.item_id.clone(),
        block_id: block.block_id,
        bucket,
    }
}

fn unscheduled(item: &WorkItem, reason: UnscheduledReason) -> Unscheduled {
    Unscheduled {
        item_id: item.item_id.clone(),
        reason,
    }
}

/// Runs a scheduling pass against a record store.
pub struct SlotAssigner<'a> {
    store: &'a dyn RecordStore,
    tasks_database_id: &'a str,
    blocks_database_id: &'a str,
    task_fields: &'a TaskFields,
    block_fields: &'a BlockFields,
    tolerance: Duration,
}

impl<'a> SlotAssigner<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        tasks_database_id: &'a str,
        blocks_database_id: &'a str,
        task_fields: &'a TaskFields,
        block_fields: &'a BlockFields,
    ) -> Self {
        Self {
            store,
            tasks_database_id,
            blocks_database_id,
            task_fields,
            block_fields,
            tolerance: Duration::seconds(DEFAULT_FIXED_TIME_TOLERANCE_SECS),
        }
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Run one pass; faults become [`PassResult::Error`].
    pub fn schedule(&self, now: DateTime<Utc>) -> PassResult<ScheduleReport> {
        match self.run(now) {
            Ok(report) => PassResult::Success(report),
            Err(e) => {
                error!(error = %e, "scheduling pass aborted");
                PassResult::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Fetch both inputs once, plan, then write one link per assignment.
    /// Writes are committed individually; a fault leaves earlier links in place.
    pub fn run(&self, now: DateTime<Utc>) -> Result<ScheduleReport> {
        let items: Vec<WorkItem> = self
            .store
            .query(self.tasks_database_id, &eligible_items_query(self.task_fields))?
            .iter()
            .filter(|r| !r.archived)
            .map(|r| WorkItem::from_record(r, self.task_fields))
            .collect();

        let blocks: Vec<TimeBlock> = self
            .store
            .query(self.blocks_database_id, &eligible_blocks_query(self.block_fields, now))?
            .iter()
            .filter(|r| !r.archived)
            .filter_map(|r| {
                let block = TimeBlock::from_record(r, self.block_fields);
                if block.is_none() {
                    warn!(block = %r.id, "time block without usable start; skipping");
                }
                block
            })
            .collect();
        debug!(items = items.len(), blocks = blocks.len(), "scheduling inputs");

        let plan = plan(&items, blocks, self.tolerance);
        for a in &plan.assignments {
            self.store
                .update(&a.block_id, &link_update(self.block_fields, &a.item_id))?;
            debug!(item = %a.item_id, block = %a.block_id, bucket = ?a.bucket, "linked");
        }
        for u in &plan.unscheduled {
            debug!(item = %u.item_id, reason = ?u.reason, "left unscheduled");
        }

        info!(
            assigned = plan.assignments.len(),
            unscheduled = plan.unscheduled.len(),
            "scheduling pass complete"
        );
        Ok(ScheduleReport {
            assigned: plan.assignments.len(),
            unscheduled: plan.unscheduled,
        })
    }
}
