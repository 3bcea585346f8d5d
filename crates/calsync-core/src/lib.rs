//! # Calsync Core Library
//!
//! Keeps a structured schedule database (Notion) and a set of external
//! calendars (Google Calendar) in step, and fills free time blocks with
//! pending work items.
//!
//! ## Architecture
//!
//! - **Sync**: pull and push passes keyed by foreign event id, driven by a
//!   configured `(context, type) -> calendar` binding table
//! - **Scheduler**: tiered greedy assignment of work items to time blocks
//! - **Integrations**: `RecordStore` / `EventSource` traits with Notion,
//!   Google Calendar and in-memory implementations
//! - **Trigger**: shared-secret check and status mapping for front ends
//! - **Status**: record-store connectivity and credential presence
//!
//! ## Key Components
//!
//! - [`ServiceContext`]: owns configuration and collaborators, runs passes
//! - [`Reconciler`]: pull/push reconciliation engine
//! - [`SlotAssigner`]: scheduling pass
//! - [`Config`] / [`Credentials`]: TOML configuration and environment secrets

pub mod config;
pub mod context;
pub mod error;
pub mod integrations;
pub mod schedule;
pub mod scheduler;
pub mod status;
pub mod sync;
pub mod trigger;

pub use config::{BlockFields, Config, Credentials, ScheduleFields, TaskFields};
pub use context::{DatabaseIds, ServiceContext};
pub use error::{ConfigError, CoreError, IncompleteRecordError};
pub use schedule::{Priority, TimeBlock, WorkItem};
pub use scheduler::{plan, ScheduleReport, SlotAssigner, UnscheduledReason};
pub use status::{Connection, DatabaseStatus, EnvironmentStatus, StatusReport};
pub use sync::{
    BindingTable, CalendarBinding, PassResult, PullReport, PushReport, Reconciler, SyncReport,
};
pub use trigger::{TriggerResponse, TriggerStatus};
