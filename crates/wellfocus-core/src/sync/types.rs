//! Core types for remote sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

/// Outcome of one flush of the upload queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Records the remote accepted.
    pub pushed: usize,
    /// Records that failed and remain queued.
    pub failed: usize,
    /// Queue length after the flush.
    pub remaining: usize,
    /// One message per failed push.
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Current sync status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub enabled: bool,
    pub base_url: Option<String>,
    /// Records waiting for upload.
    pub pending_count: usize,
    pub last_flush_at: Option<DateTime<Utc>>,
}

/// Sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Sync is not configured (set sync.enabled and sync.base_url)")]
    NotConfigured,

    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Authentication rejected by remote")]
    Unauthorized,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Local store error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl SyncError {
    /// Whether the same request may succeed later without user action.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Network(_) => true,
            SyncError::Status { status, .. } => *status >= 500 || *status == 429,
            SyncError::Persistence(e) => e.is_retryable(),
            _ => false,
        }
    }
}
