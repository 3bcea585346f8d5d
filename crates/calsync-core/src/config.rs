//! TOML-based configuration plus environment-supplied credentials.
//!
//! The TOML file carries static data: the context/type-to-calendar binding
//! table, record-store property names and pass tuning. Secrets and database
//! identifiers come from the process environment.
//!
//! Configuration is read from `~/.config/calsync/config.toml` unless
//! `CALSYNC_CONFIG` points elsewhere.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::integrations::oauth::OAuthConfig;
use crate::integrations::GoogleAuth;
use crate::sync::binding::{BindingTable, CalendarBinding};

/// Pull/push tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Events listed per calendar per pull pass.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// Slot assignment tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// A fixed-time item matches a block starting strictly less than this
    /// many seconds away.
    #[serde(default = "default_tolerance")]
    pub fixed_time_tolerance_secs: i64,
}

/// Property names of the schedule database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleFields {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default = "default_end")]
    pub end: String,
    #[serde(default = "default_foreign_id")]
    pub foreign_id: String,
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default = "default_duration")]
    pub duration: String,
    /// Optional rich-text property receiving the source calendar label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Property names of the tasks database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFields {
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_auto_schedule")]
    pub auto_schedule: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default = "default_fixed_time")]
    pub fixed_time: String,
    /// Status label marking an item as pending.
    #[serde(default = "default_pending_status")]
    pub pending_status: String,
}

/// Property names of the time-block database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockFields {
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default = "default_linked_task")]
    pub linked_item: String,
    #[serde(default = "default_auto_filled")]
    pub auto_filled: String,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Enumeration order is the pull-pass calendar order.
    #[serde(default)]
    pub bindings: Vec<CalendarBinding>,
    #[serde(default)]
    pub schedule_fields: ScheduleFields,
    #[serde(default)]
    pub task_fields: TaskFields,
    #[serde(default)]
    pub block_fields: BlockFields,
}

fn default_page_size() -> usize {
    20
}
fn default_tolerance() -> i64 {
    60
}
fn default_title() -> String {
    "Name".into()
}
fn default_start() -> String {
    "Start Time".into()
}
fn default_end() -> String {
    "End Time".into()
}
fn default_foreign_id() -> String {
    "GCal ID".into()
}
fn default_context() -> String {
    "Context".into()
}
fn default_type() -> String {
    "Type".into()
}
fn default_duration() -> String {
    "Duration".into()
}
fn default_status() -> String {
    "Status".into()
}
fn default_auto_schedule() -> String {
    "Auto-Schedule".into()
}
fn default_priority() -> String {
    "Priority".into()
}
fn default_fixed_time() -> String {
    "Fixed Time".into()
}
fn default_pending_status() -> String {
    "To Do".into()
}
fn default_linked_task() -> String {
    "Linked Task".into()
}
fn default_auto_filled() -> String {
    "Auto-Filled?".into()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fixed_time_tolerance_secs: default_tolerance(),
        }
    }
}

impl Default for ScheduleFields {
    fn default() -> Self {
        Self {
            title: default_title(),
            start: default_start(),
            end: default_end(),
            foreign_id: default_foreign_id(),
            context: default_context(),
            kind: default_type(),
            duration: default_duration(),
            source: None,
        }
    }
}

impl Default for TaskFields {
    fn default() -> Self {
        Self {
            status: default_status(),
            auto_schedule: default_auto_schedule(),
            priority: default_priority(),
            fixed_time: default_fixed_time(),
            pending_status: default_pending_status(),
        }
    }
}

impl Default for BlockFields {
    fn default() -> Self {
        Self {
            start: default_start(),
            linked_item: default_linked_task(),
            auto_filled: default_auto_filled(),
        }
    }
}

impl Config {
    /// `$CALSYNC_CONFIG`, else `~/.config/calsync/config.toml`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("CALSYNC_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calsync")
            .join("config.toml")
    }

    /// Load from the default path; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load and validate a TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sync.page_size".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.scheduler.fixed_time_tolerance_secs < 0 {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.fixed_time_tolerance_secs".into(),
                message: "must not be negative".into(),
            });
        }
        self.binding_table().map(|_| ())
    }

    /// Build the validated binding table.
    pub fn binding_table(&self) -> Result<BindingTable, ConfigError> {
        BindingTable::new(self.bindings.clone())
    }
}

/// Secrets and database identifiers read from the process environment.
#[derive(Clone)]
pub struct Credentials {
    pub notion_token: String,
    pub schedule_database_id: String,
    pub tasks_database_id: Option<String>,
    /// Falls back to the schedule database when unset.
    pub time_blocks_database_id: Option<String>,
    pub google: Option<GoogleAuth>,
    /// Shared secret guarding the scheduling trigger.
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingKey(key.to_string()));

        let google = match (
            get("GOOGLE_ACCESS_TOKEN"),
            get("GOOGLE_CLIENT_ID"),
            get("GOOGLE_CLIENT_SECRET"),
            get("GOOGLE_REFRESH_TOKEN"),
        ) {
            (Some(token), _, _, _) => Some(GoogleAuth::AccessToken(token)),
            (None, Some(id), Some(secret), Some(refresh)) => Some(GoogleAuth::RefreshToken {
                config: OAuthConfig::google(&id, &secret),
                refresh_token: refresh,
            }),
            (None, None, None, None) => None,
            (None, id, secret, refresh) => {
                let missing = [
                    ("GOOGLE_CLIENT_ID", id.is_none()),
                    ("GOOGLE_CLIENT_SECRET", secret.is_none()),
                    ("GOOGLE_REFRESH_TOKEN", refresh.is_none()),
                ]
                .into_iter()
                .find(|(_, missing)| *missing)
                .map(|(key, _)| key)
                .unwrap_or("GOOGLE_REFRESH_TOKEN");
                return Err(ConfigError::MissingKey(missing.to_string()));
            }
        };

        Ok(Self {
            notion_token: require("NOTION_TOKEN")?,
            schedule_database_id: require("DATABASE_ID_SCHEDULE")?,
            tasks_database_id: get("DATABASE_ID_TASKS"),
            time_blocks_database_id: get("DATABASE_ID_TIME_BLOCKS"),
            google,
            api_key: get("API_KEY"),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("notion_token", &"<redacted>")
            .field("schedule_database_id", &self.schedule_database_id)
            .field("tasks_database_id", &self.tasks_database_id)
            .field("time_blocks_database_id", &self.time_blocks_database_id)
            .field("google", &self.google.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
