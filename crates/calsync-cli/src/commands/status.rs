//! Record-store connectivity check.

use std::path::Path;

use calsync_core::{EnvironmentStatus, StatusReport};

use super::Session;

pub fn run(config: Option<&Path>, fixture: Option<&Path>) -> Result<i32, Box<dyn std::error::Error>> {
    let environment = EnvironmentStatus::from_env();
    let report = match Session::open(config, fixture) {
        Ok(session) => session.ctx.status_with(environment),
        Err(e) => StatusReport::failed(e.to_string(), environment),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.is_connected() { 0 } else { 1 })
}
