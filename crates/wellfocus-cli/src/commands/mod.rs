pub mod config;
pub mod history;
pub mod settings;
pub mod stats;
pub mod sync;
pub mod timer;

use serde::Serialize;
use wellfocus_core::storage::Database;
use wellfocus_core::{Config, SessionStore, Settings, TimerEngine};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

const ENGINE_KEY: &str = "timer_engine";

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Stored settings, or defaults when none were saved yet.
pub fn load_settings(db: &Database) -> Result<Settings, Box<dyn std::error::Error>> {
    Ok(db.load_settings()?.unwrap_or_default())
}

/// The engine parked by the previous invocation, or a fresh idle one.
pub fn load_engine(db: &Database) -> Result<TimerEngine, Box<dyn std::error::Error>> {
    if let Some(json) = db.kv_get(ENGINE_KEY)? {
        match serde_json::from_str::<TimerEngine>(&json) {
            Ok(engine) => return Ok(engine),
            Err(e) => tracing::warn!(error = %e, "discarding unreadable timer state"),
        }
    }
    let focus_total = db.load_focus_total()?.unwrap_or(0);
    Ok(TimerEngine::new(load_settings(db)?).with_completed_focus_sessions(focus_total))
}

pub fn save_engine(db: &Database, engine: &TimerEngine) -> CliResult {
    let json = serde_json::to_string(engine)?;
    db.kv_set(ENGINE_KEY, &json)?;
    Ok(())
}

pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    Ok(Config::load()?)
}
