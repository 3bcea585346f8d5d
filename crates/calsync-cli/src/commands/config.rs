use std::path::Path;

use calsync_core::{Config, Credentials};
use clap::Subcommand;
use serde_json::json;

use super::load_config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration and report which credentials are set
    Check,
}

pub fn run(config_path: Option<&Path>, action: ConfigAction) -> Result<i32, Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
        ConfigAction::Check => {
            let config = match load_config(config_path) {
                Ok(config) => config,
                Err(e) => {
                    println!("{}", json!({ "status": "error", "message": e.to_string() }));
                    return Ok(1);
                }
            };
            let bindings: Vec<_> = config
                .bindings
                .iter()
                .map(|b| json!({ "context": b.context, "type": b.kind, "calendar_id": b.calendar_id }))
                .collect();
            // credentials are informational; a missing key does not fail the check
            let credentials = match Credentials::from_env() {
                Ok(creds) => json!({
                    "status": "ok",
                    "calendar": creds.google.is_some(),
                    "tasks_database": creds.tasks_database_id.is_some(),
                    "api_key": creds.api_key.is_some(),
                }),
                Err(e) => json!({ "status": "missing", "message": e.to_string() }),
            };
            let report = json!({
                "status": "ok",
                "bindings": bindings,
                "credentials": credentials,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(0)
}
