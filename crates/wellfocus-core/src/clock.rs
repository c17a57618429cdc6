//! Time sources and the fixed-rate tick scheduler.
//!
//! The timer never counts ticks to measure time. Ticks only tell it *when*
//! to look at the clock; remaining time is always recomputed from absolute
//! timestamps, so delivery jitter or process suspension cannot desynchronize
//! it from wall-clock truth.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Supplies "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(TimeDelta::seconds(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Cancellable handle to a scheduled tick loop. Dropping it cancels the loop.
#[derive(Debug)]
pub struct TickHandle {
    handle: JoinHandle<()>,
}

impl TickHandle {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Invoke `callback` every `interval` until it breaks or the handle goes away.
///
/// The first invocation happens one full interval after scheduling. Missed
/// periods (a suspended process, a slow callback) are skipped, not replayed.
/// Must be called from within a tokio runtime.
pub fn schedule_tick<F, Fut>(interval: Duration, mut callback: F) -> TickHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if callback().await.is_break() {
                break;
            }
        }
    });
    TickHandle { handle }
}
