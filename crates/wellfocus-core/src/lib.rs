//! # Wellfocus Core Library
//!
//! The core of the wellfocus focus timer: a countdown state machine that
//! cycles focus and break phases, an append-only session log, and statistics
//! derived from that log. The `wellfocus` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine. It reads no clock
//!   itself; callers pass `now` and periodically invoke `tick()`
//! - **Controller**: An async single-writer facade that drives the engine
//!   from a tick loop, broadcasts events, and persists finished sessions
//! - **Storage**: SQLite-based session log and TOML-based configuration
//! - **Stats**: Today's totals and day streaks, recomputed on every read
//! - **Sync**: Optional upload of finished sessions to a remote focus API
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`FocusController`]: Async driver with event subscription
//! - [`SessionStore`]: Session log contract, implemented by [`Database`]
//! - [`StatsAggregator`]: Stats and streak computation
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod controller;
pub mod error;
pub mod events;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod timer;

pub use clock::{schedule_tick, Clock, ManualClock, SystemClock, TickHandle};
pub use controller::{ControllerOptions, FocusController};
pub use error::{ConfigError, ConfigValidationError, CoreError, PersistenceError};
pub use events::Event;
pub use settings::{Settings, SettingsPatch};
pub use stats::{DailySummary, Stats, StatsAggregator};
pub use storage::{Config, Database, MemoryStore, SessionStore, SyncConfig};
pub use sync::{SyncAdapter, SyncError, SyncReport};
pub use timer::{SessionRecord, SessionType, TimerEngine, TimerState};
