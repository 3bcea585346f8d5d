//! Explicitly constructed service context.
//!
//! Owns configuration, the validated binding table and the two external
//! collaborators. Built once per process (or per test) and passed to every
//! pass; dropping it releases the HTTP clients and their runtime.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::config::{Config, Credentials};
use crate::error::{ConfigError, CoreError, Result};
use crate::integrations::{EventSource, GoogleCalendarClient, NotionClient, RecordStore, Transport};
use crate::scheduler::{ScheduleReport, SlotAssigner};
use crate::status::{self, EnvironmentStatus, StatusReport};
use crate::sync::{BindingTable, PassResult, PullReport, PushReport, Reconciler, SyncReport};
use crate::trigger::{self, TriggerResponse};

/// Record-store databases a context works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseIds {
    pub schedule: String,
    pub tasks: Option<String>,
    /// Falls back to the schedule database when unset.
    pub time_blocks: Option<String>,
}

impl DatabaseIds {
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self {
            schedule: credentials.schedule_database_id.clone(),
            tasks: credentials.tasks_database_id.clone(),
            time_blocks: credentials.time_blocks_database_id.clone(),
        }
    }

    pub fn time_blocks(&self) -> &str {
        self.time_blocks.as_deref().unwrap_or(&self.schedule)
    }
}

pub struct ServiceContext {
    config: Config,
    bindings: BindingTable,
    store: Arc<dyn RecordStore>,
    source: Option<Arc<dyn EventSource>>,
    databases: DatabaseIds,
    api_key: Option<String>,
}

impl ServiceContext {
    /// Connect to Notion and, when credentials allow, Google Calendar.
    pub fn connect(config: Config, credentials: Credentials) -> Result<Self> {
        let transport = Transport::new()?;
        let store = NotionClient::new(transport.clone(), &credentials.notion_token);
        let source = credentials
            .google
            .clone()
            .map(|auth| Arc::new(GoogleCalendarClient::new(transport, auth)) as Arc<dyn EventSource>);

        let mut ctx = Self::with_backends(
            config,
            Arc::new(store),
            source,
            DatabaseIds::from_credentials(&credentials),
        )?;
        ctx.api_key = credentials.api_key;
        info!(
            bindings = ctx.bindings.len(),
            calendar = ctx.source.is_some(),
            "service context ready"
        );
        Ok(ctx)
    }

    /// Build around arbitrary backends (in-memory stores, fixtures).
    pub fn with_backends(
        config: Config,
        store: Arc<dyn RecordStore>,
        source: Option<Arc<dyn EventSource>>,
        databases: DatabaseIds,
    ) -> Result<Self> {
        let bindings = config.binding_table()?;
        Ok(Self {
            config,
            bindings,
            store,
            source,
            databases,
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn databases(&self) -> &DatabaseIds {
        &self.databases
    }

    fn reconciler(&self) -> Result<Reconciler<'_>> {
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| ConfigError::MissingKey("GOOGLE_ACCESS_TOKEN".into()))?;
        Ok(Reconciler::new(
            self.store.as_ref(),
            source,
            &self.bindings,
            self.config.schedule_fields.clone(),
            &self.databases.schedule,
        )
        .with_page_size(self.config.sync.page_size))
    }

    pub fn pull(&self) -> PassResult<PullReport> {
        self.pull_at(Utc::now())
    }

    pub fn pull_at(&self, now: DateTime<Utc>) -> PassResult<PullReport> {
        match self.reconciler() {
            Ok(engine) => engine.pull(now),
            Err(e) => error_result(e),
        }
    }

    pub fn push(&self) -> PassResult<PushReport> {
        match self.reconciler() {
            Ok(engine) => engine.push(),
            Err(e) => error_result(e),
        }
    }

    pub fn sync(&self) -> SyncReport {
        self.sync_at(Utc::now())
    }

    pub fn sync_at(&self, now: DateTime<Utc>) -> SyncReport {
        match self.reconciler() {
            Ok(engine) => engine.pull_and_push(now),
            Err(e) => {
                let message = e.to_string();
                SyncReport {
                    pull: PassResult::Error {
                        message: message.clone(),
                    },
                    push: PassResult::Error { message },
                    timestamp: Utc::now(),
                }
            }
        }
    }

    pub fn schedule(&self) -> PassResult<ScheduleReport> {
        self.schedule_at(Utc::now())
    }

    pub fn schedule_at(&self, now: DateTime<Utc>) -> PassResult<ScheduleReport> {
        let Some(tasks) = self.databases.tasks.as_deref() else {
            return error_result(ConfigError::MissingKey("DATABASE_ID_TASKS".into()).into());
        };
        SlotAssigner::new(
            self.store.as_ref(),
            tasks,
            self.databases.time_blocks(),
            &self.config.task_fields,
            &self.config.block_fields,
        )
        .with_tolerance(Duration::seconds(self.config.scheduler.fixed_time_tolerance_secs))
        .schedule(now)
    }

    /// Check that every configured database is reachable.
    pub fn status(&self) -> StatusReport {
        self.status_with(EnvironmentStatus::from_env())
    }

    pub fn status_with(&self, environment: EnvironmentStatus) -> StatusReport {
        status::check(self.store.as_ref(), &self.databases, environment)
    }

    /// Key-guarded scheduling trigger.
    pub fn trigger_schedule(&self, key: Option<&str>) -> TriggerResponse {
        self.trigger_schedule_at(key, Utc::now())
    }

    pub fn trigger_schedule_at(&self, key: Option<&str>, now: DateTime<Utc>) -> TriggerResponse {
        trigger::schedule(key, self.api_key.as_deref(), || self.schedule_at(now))
    }
}

fn error_result<T>(e: CoreError) -> PassResult<T> {
    tracing::error!(error = %e, "pass not started");
    PassResult::Error {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{MemoryEventSource, MemoryRecordStore};

    fn databases(tasks: Option<&str>) -> DatabaseIds {
        DatabaseIds {
            schedule: "schedule".into(),
            tasks: tasks.map(String::from),
            time_blocks: None,
        }
    }

    #[test]
    fn test_missing_calendar_fails_sync_passes() {
        let ctx = ServiceContext::with_backends(
            Config::default(),
            Arc::new(MemoryRecordStore::new()),
            None,
            databases(None),
        )
        .unwrap();
        let err = ctx.pull();
        assert!(err.error_message().unwrap().contains("GOOGLE_ACCESS_TOKEN"));
        assert!(!ctx.sync().is_success());
    }

    #[test]
    fn test_missing_tasks_database_fails_schedule() {
        let ctx = ServiceContext::with_backends(
            Config::default(),
            Arc::new(MemoryRecordStore::new()),
            Some(Arc::new(MemoryEventSource::new())),
            databases(None),
        )
        .unwrap();
        assert!(ctx.schedule().error_message().unwrap().contains("DATABASE_ID_TASKS"));
    }

    #[test]
    fn test_trigger_schedule_requires_key() {
        let ctx = ServiceContext::with_backends(
            Config::default(),
            Arc::new(MemoryRecordStore::new()),
            None,
            databases(Some("tasks")),
        )
        .unwrap()
        .with_api_key(Some("secret".into()));

        assert_eq!(ctx.trigger_schedule(Some("nope")).status.http_status(), 403);
        let ok = ctx.trigger_schedule(Some("secret"));
        assert_eq!(ok.status.http_status(), 200);
        assert_eq!(ok.body["assigned"], 0);
    }

    #[test]
    fn test_status_retrieves_configured_databases() {
        let store = Arc::new(MemoryRecordStore::new());
        store.add_database("schedule", Some("Schedule"));
        let ctx = ServiceContext::with_backends(Config::default(), store.clone(), None, databases(Some("tasks")))
            .unwrap();

        // the tasks database is configured but does not exist
        let report = ctx.status_with(EnvironmentStatus::default());
        assert!(!report.is_connected());

        store.add_database("tasks", None);
        let report = ctx.status_with(EnvironmentStatus::default());
        assert!(report.is_connected());
        assert_eq!(report.databases.len(), 2);
    }

    #[test]
    fn test_time_blocks_fall_back_to_schedule() {
        assert_eq!(databases(None).time_blocks(), "schedule");
    }
}
