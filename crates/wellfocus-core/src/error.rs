//! Core error types for wellfocus-core.
//!
//! No error in this crate is fatal to the timer: persistence and sync
//! failures cost at most one historical record (until retried), and invalid
//! transitions are reported as `None` from the engine rather than as errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::SyncError;

/// Core error type for wellfocus-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session log / settings storage errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rejected settings update
    #[error("Invalid settings: {0}")]
    Validation(#[from] ConfigValidationError),

    /// Remote sync errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Failure to append to or read from the session log.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked by another writer
    #[error("Database is locked")]
    Locked,

    /// Storage handle could not be acquired
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl PersistenceError {
    /// Whether the same operation may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PersistenceError::Corrupt(_) | PersistenceError::MigrationFailed(_))
    }
}

/// Configuration-file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not exist in the configuration tree
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// A settings update that was rejected. Prior settings are left intact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy
                ) =>
            {
                PersistenceError::Locked
            }
            _ => PersistenceError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
