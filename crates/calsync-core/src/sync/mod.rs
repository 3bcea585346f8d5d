//! Calendar/database reconciliation.
//!
//! Pull imports upcoming calendar events into the schedule database, keyed
//! by foreign id. Push exports schedule records lacking a foreign id to the
//! calendar bound to their context and type.

pub mod binding;
pub mod engine;
pub mod projector;
pub mod resolver;
pub mod types;


pub use binding::{BindingTable, CalendarBinding};
pub use engine::{Reconciler, DEFAULT_PAGE_SIZE, DEFAULT_TITLE};
pub use projector::FieldProjector;
pub use resolver::IdentityResolver;
pub use types::{
    Event, PassResult, ProjectedEvent, PullReport, PushReport, ScheduleRecord, SyncReport,
};
