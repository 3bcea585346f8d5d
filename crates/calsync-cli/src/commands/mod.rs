pub mod config;
pub mod schedule;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};

use calsync_core::{Config, ConfigError, Credentials, ServiceContext, TriggerResponse};
use chrono::{DateTime, Utc};
use clap::Args;

use crate::fixture::FixtureBackends;

/// Options shared by every pass.
#[derive(Args, Debug, Clone)]
pub struct PassArgs {
    /// Run against a JSON fixture instead of the live services
    #[arg(long)]
    pub fixture: Option<PathBuf>,
    /// Write the resulting state back into the fixture
    #[arg(long, requires = "fixture")]
    pub save: bool,
    /// Treat this RFC 3339 instant as "now"
    #[arg(long)]
    pub now: Option<DateTime<Utc>>,
}

impl PassArgs {
    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// A service context plus the fixture it was built from, if any.
pub struct Session {
    pub ctx: ServiceContext,
    fixture: Option<FixtureBackends>,
}

impl Session {
    pub fn open(config_path: Option<&Path>, fixture: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = load_config(config_path)?;

        let Some(path) = fixture else {
            let credentials = Credentials::from_env()?;
            let ctx = ServiceContext::connect(config, credentials)?;
            return Ok(Self { ctx, fixture: None });
        };

        let backends = FixtureBackends::open(path)?;
        let api_key = backends
            .fixture()
            .api_key
            .clone()
            .or_else(|| std::env::var("API_KEY").ok());
        let ctx = ServiceContext::with_backends(
            config,
            backends.store.clone(),
            Some(backends.source.clone()),
            backends.fixture().database_ids(),
        )?
        .with_api_key(api_key);
        Ok(Self {
            ctx,
            fixture: Some(backends),
        })
    }

    pub fn finish(self, save: bool) -> Result<(), Box<dyn std::error::Error>> {
        match self.fixture {
            Some(backends) if save => backends.save(),
            _ => Ok(()),
        }
    }
}

/// Print the JSON body on stdout and return the exit code.
pub fn emit(response: &TriggerResponse) -> Result<i32, Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(response.status.exit_code())
}
