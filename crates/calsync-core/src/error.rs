//! Core error types for calsync-core.
//!
//! Faults that abort a pass travel as [`CoreError`]. Per-item data anomalies
//! are not errors at all; they are logged and skipped at the call site.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for calsync-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Faults reported by an external service (non-2xx, malformed payload)
    #[error("Integration error for '{service}': {message}")]
    Integration {
        service: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transport-level HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Build an integration error without an underlying source.
    pub fn integration(service: &str, message: impl Into<String>) -> Self {
        CoreError::Integration {
            service: service.to_string(),
            message: message.into(),
            source: None,
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Two bindings claim the same (context, type) pair or calendar
    #[error("Duplicate calendar binding for {what}")]
    DuplicateBinding { what: String },
}

/// A record lacks a field required to project it into a calendar event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record {record_id} is missing required field '{field}'")]
pub struct IncompleteRecordError {
    pub record_id: String,
    pub field: &'static str,
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
