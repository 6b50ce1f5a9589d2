//! Error types for autoloop
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in autoloop
#[derive(Debug, Error)]
pub enum AutoloopError {
    /// Invalid configuration, fatal at construction
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Signals could not be observed this cycle
    #[error("Signal gathering error: {0}")]
    SignalGathering(String),

    /// An action failed while executing
    #[error("Action execution error: {0}")]
    ActionExecution(String),

    /// No action is registered for the requested kind
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Storage/persistence error
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// An external call exceeded its timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Operation requires a running loop
    #[error("Control loop is not running")]
    NotRunning,

    /// Operation conflicts with the running worker
    #[error("Control loop is already running")]
    AlreadyRunning,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl AutoloopError {
    /// Collapse any error raised inside a store into a persistence error.
    pub fn into_persistence(self) -> Self {
        match self {
            AutoloopError::Persistence(_) => self,
            other => AutoloopError::Persistence(other.to_string()),
        }
    }
}

/// Result type alias for autoloop operations
pub type Result<T> = std::result::Result<T, AutoloopError>;
