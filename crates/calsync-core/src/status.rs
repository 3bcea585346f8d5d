//! Connectivity report for the record store.
//!
//! Retrieves every configured database and records which credentials are
//! present, so a deployment can be checked without running a pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::context::DatabaseIds;
use crate::integrations::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connection {
    Connected,
    Failed,
}

/// One database the context works against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStatus {
    /// `schedule`, `tasks` or `time_blocks`.
    pub role: String,
    pub id: String,
    pub title: Option<String>,
}

/// Which credentials are set. Values are never reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentStatus {
    pub notion_token: bool,
    pub calendar: bool,
    pub tasks_database: bool,
    pub api_key: bool,
}

impl EnvironmentStatus {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).is_some_and(|v| !v.trim().is_empty());
        Self {
            notion_token: set("NOTION_TOKEN"),
            calendar: set("GOOGLE_ACCESS_TOKEN") || set("GOOGLE_REFRESH_TOKEN"),
            tasks_database: set("DATABASE_ID_TASKS"),
            api_key: set("API_KEY"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    pub connection: Connection,
    pub databases: Vec<DatabaseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub environment: EnvironmentStatus,
}

impl StatusReport {
    /// Report for a store that could not be reached or built.
    pub fn failed(message: impl Into<String>, environment: EnvironmentStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            connection: Connection::Failed,
            databases: Vec::new(),
            error: Some(message.into()),
            environment,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection == Connection::Connected
    }
}

/// Retrieve each configured database in turn. The first failure marks the
/// store unreachable and stops the check.
pub fn check(
    store: &dyn RecordStore,
    databases: &DatabaseIds,
    environment: EnvironmentStatus,
) -> StatusReport {
    let mut targets = vec![("schedule", databases.schedule.as_str())];
    if let Some(tasks) = databases.tasks.as_deref() {
        targets.push(("tasks", tasks));
    }
    if let Some(blocks) = databases.time_blocks.as_deref() {
        targets.push(("time_blocks", blocks));
    }

    let mut found = Vec::with_capacity(targets.len());
    for (role, id) in targets {
        match store.retrieve_database(id) {
            Ok(info) => found.push(DatabaseStatus {
                role: role.to_string(),
                id: info.id,
                title: info.title,
            }),
            Err(e) => {
                error!(role, database = id, error = %e, "database unreachable");
                return StatusReport::failed(e.to_string(), environment);
            }
        }
    }

    info!(databases = found.len(), "record store connected");
    StatusReport {
        timestamp: Utc::now(),
        connection: Connection::Connected,
        databases: found,
        error: None,
        environment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{MemoryRecordStore, StoreOp};
    use serde_json::json;

    fn ids(tasks: Option<&str>, blocks: Option<&str>) -> DatabaseIds {
        DatabaseIds {
            schedule: "schedule".into(),
            tasks: tasks.map(String::from),
            time_blocks: blocks.map(String::from),
        }
    }

    #[test]
    fn test_connected_lists_configured_databases() {
        let store = MemoryRecordStore::new();
        store.add_database("schedule", Some("Schedule"));
        store.add_database("tasks", None);

        let report = check(&store, &ids(Some("tasks"), None), EnvironmentStatus::default());
        assert!(report.is_connected());
        let roles: Vec<&str> = report.databases.iter().map(|d| d.role.as_str()).collect();
        assert_eq!(roles, vec!["schedule", "tasks"]);
        assert_eq!(report.databases[0].title.as_deref(), Some("Schedule"));
        assert!(report.error.is_none());
    }

    #[test]
    fn test_unknown_database_fails() {
        let store = MemoryRecordStore::new();
        store.add_database("schedule", None);

        let report = check(&store, &ids(None, Some("blocks")), EnvironmentStatus::default());
        assert_eq!(report.connection, Connection::Failed);
        assert!(report.databases.is_empty());
        assert!(report.error.unwrap().contains("blocks"));
    }

    #[test]
    fn test_transport_fault_fails() {
        let store = MemoryRecordStore::new();
        store.add_database("schedule", None);
        store.fail_after(StoreOp::RetrieveDatabase, 0);
        assert!(!check(&store, &ids(None, None), EnvironmentStatus::default()).is_connected());
    }

    #[test]
    fn test_environment_flags_only() {
        let env = EnvironmentStatus::from_lookup(|key| match key {
            "NOTION_TOKEN" => Some("secret".into()),
            "GOOGLE_REFRESH_TOKEN" => Some("refresh".into()),
            "API_KEY" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({ "notion_token": true, "calendar": true, "tasks_database": false, "api_key": false })
        );
    }

    #[test]
    fn test_failed_report_wire_shape() {
        let body = serde_json::to_value(StatusReport::failed("boom", EnvironmentStatus::default())).unwrap();
        assert_eq!(body["connection"], "failed");
        assert_eq!(body["error"], "boom");
        assert_eq!(body["databases"], json!([]));
    }
}
