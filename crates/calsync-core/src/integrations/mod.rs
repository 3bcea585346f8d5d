pub mod google;
pub mod memory;
pub mod notion;
pub mod oauth;
pub mod traits;
pub mod transport;
pub mod types;

pub use google::{GoogleAuth, GoogleCalendarClient};
pub use memory::{MemoryEventSource, MemoryRecordStore, StoreOp};
pub use notion::NotionClient;
pub use traits::{EventQuery, EventSource, Filter, Query, RecordStore};
pub use transport::Transport;
pub use types::{
    DatabaseInfo, EventTime, NewEvent, PropertyKind, PropertySet, PropertyValue, RemoteEvent, StoredRecord,
};
