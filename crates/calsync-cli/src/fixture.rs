//! Offline backends loaded from a JSON fixture.
//!
//! A fixture holds the record-store databases, the calendars and the
//! database ids, so a pass can be rehearsed without credentials. With
//! `--save` the mutated state is written back to the same file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use calsync_core::integrations::{MemoryEventSource, MemoryRecordStore, RemoteEvent, StoredRecord};
use calsync_core::DatabaseIds;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDatabases {
    pub schedule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_blocks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub databases: FixtureDatabases,
    /// Database id -> rows.
    #[serde(default)]
    pub records: BTreeMap<String, Vec<StoredRecord>>,
    /// Calendar id -> events.
    #[serde(default)]
    pub calendars: BTreeMap<String, Vec<RemoteEvent>>,
    /// Expected scheduling key; `API_KEY` is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read fixture {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn database_ids(&self) -> DatabaseIds {
        DatabaseIds {
            schedule: self.databases.schedule.clone(),
            tasks: self.databases.tasks.clone(),
            time_blocks: self.databases.time_blocks.clone(),
        }
    }
}

/// In-memory backends seeded from a fixture file.
pub struct FixtureBackends {
    path: PathBuf,
    fixture: Fixture,
    pub store: Arc<MemoryRecordStore>,
    pub source: Arc<MemoryEventSource>,
}

impl FixtureBackends {
    pub fn open(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let fixture = Fixture::load(path)?;
        let store = Arc::new(MemoryRecordStore::from_databases(fixture.records.clone()));
        let ids = fixture.database_ids();
        for id in [Some(&ids.schedule), ids.tasks.as_ref(), ids.time_blocks.as_ref()]
            .into_iter()
            .flatten()
        {
            store.add_database(id, None);
        }
        let source = Arc::new(MemoryEventSource::from_calendars(fixture.calendars.clone()));
        Ok(Self {
            path: path.to_path_buf(),
            fixture,
            store,
            source,
        })
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    /// Write the current store and calendar state back to the fixture file.
    pub fn save(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.fixture.records = self.store.databases();
        self.fixture.calendars = self.source.calendars();
        let json = serde_json::to_string_pretty(&self.fixture)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), "fixture saved");
        Ok(())
    }
}
