mod config;
pub mod database;
mod memory;
pub mod migrations;
mod store;

pub use config::{Config, SyncConfig};
pub use database::Database;
pub use memory::MemoryStore;
pub use store::{RecentSessions, SessionStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/wellfocus[-dev]/` based on WELLFOCUS_ENV.
///
/// Set WELLFOCUS_ENV=dev to use the development data directory, or
/// WELLFOCUS_DATA_DIR to put everything somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("WELLFOCUS_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("WELLFOCUS_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("wellfocus-dev")
            } else {
                base_dir.join("wellfocus")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
