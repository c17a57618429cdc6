//! Async facade over the timer engine.
//!
//! [`FocusController`] owns the single writer over the engine: user commands
//! and the tick loop both go through one mutex, so a tick is never applied
//! while a transition is in flight. Every resulting event is broadcast to
//! subscribers; a slow subscriber lags and drops events but never stalls the
//! timer.
//!
//! Records are appended after the transition is visible. A failed append
//! keeps the record in a retry queue and publishes
//! [`Event::PersistenceFailed`]; the transition itself is never rolled back.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::clock::{schedule_tick, Clock, TickHandle};
use crate::error::{CoreError, PersistenceError};
use crate::events::Event;
use crate::settings::{Settings, SettingsPatch};
use crate::stats::{Stats, StatsAggregator};
use crate::storage::{Config, SessionStore};
use crate::sync::SyncAdapter;
use crate::timer::{SessionRecord, SessionType, TimerEngine, TimerState};

const EVENT_CAPACITY: usize = 64;
/// `PersistenceFailed::record_id` when the log could not be read back for stats.
pub const STATS_ID: &str = "stats";

/// Runtime knobs for a [`FocusController`].
#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    pub tick_interval: Duration,
    /// Move `completed -> idle` as soon as a phase ends.
    pub auto_advance: bool,
    /// Offset used to decide what "today" is for stats.
    pub utc_offset: FixedOffset,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            auto_advance: true,
            utc_offset: StatsAggregator::utc().offset(),
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            auto_advance: config.auto_advance,
            utc_offset: config.utc_offset(),
        }
    }
}

struct Shared<S: SessionStore> {
    engine: Mutex<TimerEngine>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<Event>,
    pending: Mutex<Vec<SessionRecord>>,
    sync: Option<Arc<SyncAdapter>>,
    aggregator: StatsAggregator,
    auto_advance: bool,
}

pub struct FocusController<S: SessionStore + 'static> {
    shared: Arc<Shared<S>>,
    ticker: StdMutex<Option<TickHandle>>,
    tick_interval: Duration,
}

impl<S: SessionStore + 'static> FocusController<S> {
    /// Build a controller with an idle engine, using stored settings when
    /// present and valid. The lifetime focus count carries over from the
    /// store; the cadence starts fresh.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, options: ControllerOptions) -> Result<Self, CoreError> {
        let settings = match store.load_settings()? {
            Some(settings) => match settings.validate() {
                Ok(()) => settings,
                Err(e) => {
                    warn!(error = %e, "stored settings invalid, using defaults");
                    Settings::default()
                }
            },
            None => Settings::default(),
        };
        let focus_total = store.load_focus_total()?.unwrap_or(0);
        let engine = TimerEngine::new(settings).with_completed_focus_sessions(focus_total);
        Ok(Self::with_engine(engine, store, clock, options))
    }

    /// Build a controller around an existing engine (e.g. one restored from
    /// disk). A running phase gets its tick loop back on the next command or
    /// [`FocusController::ensure_ticking`].
    pub fn with_engine(
        engine: TimerEngine,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        options: ControllerOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                store,
                clock,
                events,
                pending: Mutex::new(Vec::new()),
                sync: None,
                aggregator: StatsAggregator::new(options.utc_offset),
                auto_advance: options.auto_advance,
            }),
            ticker: StdMutex::new(None),
            tick_interval: options.tick_interval,
        }
    }

    /// Attach a sync adapter; finished records are queued for upload.
    /// Must be called before the controller is shared or started.
    pub fn with_sync(mut self, adapter: Arc<SyncAdapter>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.sync = Some(adapter),
            None => warn!("sync adapter attached after start; ignored"),
        }
        self
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn start(&self, session_type: Option<SessionType>, intention: Option<String>) -> Option<Event> {
        let event = self
            .shared
            .transition(|engine, now| engine.start(session_type, intention, now))
            .await;
        if event.is_some() {
            self.ensure_ticking().await;
        }
        event
    }

    pub async fn pause(&self) -> Option<Event> {
        self.shared.transition(|engine, now| engine.pause(now)).await
    }

    pub async fn resume(&self) -> Option<Event> {
        let event = self.shared.transition(|engine, now| engine.resume(now)).await;
        if event.is_some() {
            self.ensure_ticking().await;
        }
        event
    }

    pub async fn skip(&self) -> Option<Event> {
        let event = self.shared.transition(|engine, now| engine.skip(now)).await;
        if event.is_some() {
            self.stop_ticking();
        }
        event
    }

    pub async fn reset(&self) -> Option<Event> {
        let event = self.shared.transition(|engine, now| engine.reset(now)).await;
        if event.is_some() {
            self.stop_ticking();
        }
        event
    }

    /// The user left the session screen: reset from whatever state is current.
    pub async fn abandon(&self) -> Option<Event> {
        debug!("session abandoned");
        self.reset().await
    }

    pub async fn advance(&self) -> Option<Event> {
        self.shared.transition(|engine, now| engine.advance(now)).await
    }

    /// Process one tick immediately instead of waiting for the loop.
    pub async fn poll(&self) -> Option<Event> {
        self.shared.on_tick().await.1
    }

    /// Merge and persist a settings patch. An invalid patch changes nothing.
    /// A failed save is logged and published; the in-memory update stands.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<Event, CoreError> {
        let (event, settings) = {
            let mut engine = self.shared.engine.lock().await;
            let event = engine.update_settings(patch, self.shared.clock.now())?;
            self.shared.publish(event.clone());
            (event, *engine.settings())
        };

        let store = Arc::clone(&self.shared.store);
        match run_blocking(move || store.save_settings(&settings)).await {
            Ok(()) => {}
            Err(e) => {
                warn!(error = %e, "failed to persist settings");
                self.shared.publish(Event::PersistenceFailed {
                    record_id: "settings".into(),
                    message: e.to_string(),
                    at: self.shared.clock.now(),
                });
            }
        }
        Ok(event)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> Event {
        let engine = self.shared.engine.lock().await;
        engine.snapshot(self.shared.clock.now())
    }

    pub async fn state(&self) -> TimerState {
        self.shared.engine.lock().await.state()
    }

    /// A copy of the engine, for callers that park it between processes.
    pub async fn engine(&self) -> TimerEngine {
        self.shared.engine.lock().await.clone()
    }

    pub async fn settings(&self) -> Settings {
        *self.shared.engine.lock().await.settings()
    }

    /// Stats recomputed from the full log as of now.
    pub async fn stats(&self) -> Result<Stats, CoreError> {
        Ok(self.shared.compute_stats().await?)
    }

    /// Records that failed to append and are waiting for a retry.
    pub async fn pending_count(&self) -> usize {
        self.shared.pending.lock().await.len()
    }

    /// Try every pending record again. Returns how many were appended.
    pub async fn retry_pending(&self) -> usize {
        self.shared.retry_pending().await
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Make sure a tick loop is running if the engine has a live phase.
    pub async fn ensure_ticking(&self) {
        let live = matches!(self.state().await, TimerState::Running | TimerState::Paused);
        if !live {
            return;
        }
        let mut ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if ticker.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        *ticker = Some(schedule_tick(self.tick_interval, move || {
            let shared = Arc::clone(&shared);
            async move { shared.on_tick().await.0 }
        }));
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    fn stop_ticking(&self) {
        if let Some(handle) = self.ticker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.cancel();
        }
    }

    /// Stop the tick loop and make one last attempt at pending records.
    /// Returns how many records are still not durable.
    pub async fn shutdown(&self) -> usize {
        self.stop_ticking();
        self.retry_pending().await;
        let left = self.pending_count().await;
        if left > 0 {
            warn!(pending = left, "shutting down with records not yet persisted");
        }
        left
    }
}

impl<S: SessionStore + 'static> Drop for FocusController<S> {
    fn drop(&mut self) {
        self.stop_ticking();
    }
}

impl<S: SessionStore + 'static> Shared<S> {
    fn publish(&self, event: Event) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Apply one engine command under the writer lock, publish the result,
    /// then persist any record it produced.
    async fn transition<F>(&self, command: F) -> Option<Event>
    where
        F: FnOnce(&mut TimerEngine, DateTime<Utc>) -> Option<Event>,
    {
        let (event, focus_total) = {
            let mut engine = self.engine.lock().await;
            let now = self.clock.now();
            let event = command(&mut engine, now)?;
            self.publish(event.clone());
            self.after_completion(&mut engine, &event, now);
            let focus_total = focus_total_after(&engine, &event);
            (event, focus_total)
        };
        if let Some(total) = focus_total {
            self.save_focus_total(total).await;
        }
        if let Some(record) = event.record() {
            self.persist(record.clone()).await;
        }
        Some(event)
    }

    fn after_completion(&self, engine: &mut TimerEngine, event: &Event, now: DateTime<Utc>) {
        if self.auto_advance && matches!(event, Event::TimerCompleted { .. }) {
            if let Some(advanced) = engine.advance(now) {
                self.publish(advanced);
            }
        }
    }

    /// One tick. Returns whether the loop should keep going, and the
    /// completion event if the phase ended.
    async fn on_tick(&self) -> (ControlFlow<()>, Option<Event>) {
        let (completed, focus_total) = {
            let mut engine = self.engine.lock().await;
            let now = self.clock.now();
            match engine.state() {
                TimerState::Paused => return (ControlFlow::Continue(()), None),
                TimerState::Running => {}
                TimerState::Idle | TimerState::Completed => return (ControlFlow::Break(()), None),
            }
            match engine.tick(now) {
                Some(event) => {
                    self.publish(event.clone());
                    self.after_completion(&mut engine, &event, now);
                    let focus_total = focus_total_after(&engine, &event);
                    (event, focus_total)
                }
                None => {
                    self.publish(Event::Tick {
                        session_type: engine.session_type(),
                        remaining_secs: engine.remaining_secs(now),
                        total_secs: engine.total_secs(),
                        progress: engine.progress(now),
                        at: now,
                    });
                    return (ControlFlow::Continue(()), None);
                }
            }
        };
        if let Some(total) = focus_total {
            self.save_focus_total(total).await;
        }
        if let Some(record) = completed.record() {
            self.persist(record.clone()).await;
        }
        (ControlFlow::Break(()), Some(completed))
    }

    async fn save_focus_total(&self, total: u64) {
        let store = Arc::clone(&self.store);
        if let Err(e) = run_blocking(move || store.save_focus_total(total)).await {
            warn!(total, error = %e, "failed to persist focus total");
        }
    }

    async fn append(&self, record: SessionRecord) -> Result<(), PersistenceError> {
        let store = Arc::clone(&self.store);
        run_blocking(move || store.append(&record)).await
    }

    async fn persist(&self, record: SessionRecord) {
        match self.append(record.clone()).await {
            Ok(()) => self.after_append(record).await,
            Err(e) => {
                warn!(id = %record.id, error = %e, "append failed; queued for retry");
                let record_id = record.id.clone();
                self.pending.lock().await.push(record);
                self.publish(Event::PersistenceFailed {
                    record_id,
                    message: e.to_string(),
                    at: self.clock.now(),
                });
            }
        }
    }

    async fn after_append(&self, record: SessionRecord) {
        if let Some(sync) = &self.sync {
            if let Err(e) = sync.enqueue(record).await {
                warn!(error = %e, "failed to queue record for sync");
            }
        }
        match self.compute_stats().await {
            Ok(stats) => self.publish(Event::StatsUpdated {
                stats,
                at: self.clock.now(),
            }),
            Err(e) => {
                warn!(error = %e, "stats recompute failed");
                self.publish(Event::PersistenceFailed {
                    record_id: STATS_ID.into(),
                    message: e.to_string(),
                    at: self.clock.now(),
                });
            }
        }
    }

    async fn compute_stats(&self) -> Result<Stats, PersistenceError> {
        let store = Arc::clone(&self.store);
        let records = run_blocking(move || store.all()).await?;
        Ok(self.aggregator.compute_at(&records, self.clock.now()))
    }

    async fn retry_pending(&self) -> usize {
        let queued = std::mem::take(&mut *self.pending.lock().await);
        if queued.is_empty() {
            return 0;
        }
        let mut failed = Vec::new();
        let mut appended = 0;
        for record in queued {
            match self.append(record.clone()).await {
                Ok(()) => {
                    appended += 1;
                    self.after_append(record).await;
                }
                Err(e) => {
                    debug!(id = %record.id, error = %e, "retry failed");
                    failed.push(record);
                }
            }
        }
        if !failed.is_empty() {
            let mut pending = self.pending.lock().await;
            failed.append(&mut pending);
            *pending = failed;
        }
        info!(appended, "retried pending records");
        appended
    }
}

/// The lifetime focus count to save when `event` finished a focus phase.
fn focus_total_after(engine: &TimerEngine, event: &Event) -> Option<u64> {
    match event {
        Event::TimerCompleted { record, .. } | Event::TimerSkipped { record, .. } if record.is_focus() => {
            Some(engine.completed_focus_sessions())
        }
        _ => None,
    }
}

/// Run a blocking store call off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, PersistenceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PersistenceError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PersistenceError::Unavailable(format!("store task failed: {e}")))?
}
