use std::sync::Arc;

use clap::Subcommand;
use tokio::sync::broadcast::error::RecvError;
use wellfocus_core::storage::Database;
use wellfocus_core::sync::SyncQueue;
use wellfocus_core::{
    Clock, Config, ControllerOptions, Event, FocusController, SessionRecord, SessionStore, SessionType,
    SystemClock, TimerEngine, TimerState,
};

use super::{load_config, load_engine, print_json, save_engine, CliResult};

const PENDING_KEY: &str = "pending_records";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a phase (the pre-selected type unless --type is given)
    Start {
        /// focus, short-break or long-break
        #[arg(long = "type", value_parser = parse_session_type)]
        session_type: Option<SessionType>,
        /// What this focus phase is for
        #[arg(long)]
        intention: Option<String>,
    },
    /// Pause the running phase
    Pause,
    /// Resume a paused phase
    Resume,
    /// End the phase early and move to the next one
    Skip,
    /// Abandon the phase and return to idle
    Reset,
    /// Leave a completed phase and pre-select the next one
    Advance,
    /// Print current timer state as JSON
    Status,
    /// Run in the foreground until the phase ends, printing events as JSON lines
    Run {
        #[arg(long = "type", value_parser = parse_session_type)]
        session_type: Option<SessionType>,
        #[arg(long)]
        intention: Option<String>,
    },
}

fn parse_session_type(value: &str) -> Result<SessionType, String> {
    SessionType::parse(value)
        .ok_or_else(|| format!("unknown session type '{value}' (expected focus, short-break or long-break)"))
}

pub fn run(action: TimerAction) -> CliResult {
    let config = load_config()?;
    let db = Database::open()?;
    retry_stashed(&db);

    let mut engine = load_engine(&db)?;
    let now = SystemClock.now();

    let event = match action {
        TimerAction::Start { session_type, intention } => engine.start(session_type, intention, now),
        TimerAction::Pause => engine.pause(now),
        TimerAction::Resume => engine.resume(now),
        TimerAction::Skip => engine.skip(now),
        TimerAction::Reset => engine.reset(now),
        TimerAction::Advance => engine.advance(now),
        TimerAction::Status => engine.tick(now),
        TimerAction::Run { session_type, intention } => {
            return run_foreground(db, engine, &config, session_type, intention);
        }
    };

    let mut events: Vec<Event> = event.into_iter().collect();
    if config.auto_advance && matches!(events.last(), Some(Event::TimerCompleted { .. })) {
        events.extend(engine.advance(now));
    }

    // Park the new state first: a failed append must not undo the transition.
    save_engine(&db, &engine)?;
    if events.iter().any(ends_focus_phase) {
        if let Err(e) = db.save_focus_total(engine.completed_focus_sessions()) {
            tracing::warn!(error = %e, "could not save focus total");
        }
    }
    let persisted = persist_records(&db, &config, &events);

    if events.is_empty() {
        print_json(&engine.snapshot(now))?;
    }
    for event in &events {
        print_json(event)?;
    }
    persisted
}

fn ends_focus_phase(event: &Event) -> bool {
    matches!(event, Event::TimerCompleted { .. } | Event::TimerSkipped { .. })
        && event.record().is_some_and(SessionRecord::is_focus)
}

fn persist_records(db: &Database, config: &Config, events: &[Event]) -> CliResult {
    for record in events.iter().filter_map(Event::record) {
        if let Err(e) = db.append(record) {
            stash(db, record);
            return Err(format!("session {} not saved ({e}); it will be retried", record.id).into());
        }
        queue_for_sync(config, record);
    }
    Ok(())
}

/// Keep a record that failed to append so the next invocation can retry it.
fn stash(db: &Database, record: &SessionRecord) {
    let mut pending = read_stash(db);
    if !pending.iter().any(|r| r.id == record.id) {
        pending.push(record.clone());
    }
    let written = serde_json::to_string(&pending)
        .map_err(|e| e.to_string())
        .and_then(|json| db.kv_set(PENDING_KEY, &json).map_err(|e| e.to_string()));
    if let Err(e) = written {
        tracing::error!(id = %record.id, error = %e, "could not stash unsaved session");
    }
}

fn read_stash(db: &Database) -> Vec<SessionRecord> {
    db.kv_get(PENDING_KEY)
        .ok()
        .flatten()
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}

fn retry_stashed(db: &Database) {
    let pending = read_stash(db);
    if pending.is_empty() {
        return;
    }
    let mut left = Vec::new();
    for record in pending {
        if db.append(&record).is_err() {
            left.push(record);
        }
    }
    let json = serde_json::to_string(&left).unwrap_or_else(|_| "[]".into());
    if let Err(e) = db.kv_set(PENDING_KEY, &json) {
        tracing::warn!(error = %e, "could not update stashed sessions");
    }
}

fn queue_for_sync(config: &Config, record: &SessionRecord) {
    if !config.sync.enabled {
        return;
    }
    let queued = SyncQueue::open().and_then(|mut queue| {
        queue.enqueue(record.clone());
        queue.persist()
    });
    if let Err(e) = queued {
        tracing::warn!(id = %record.id, error = %e, "could not queue session for sync");
    }
}

fn run_foreground(
    db: Database,
    engine: TimerEngine,
    config: &Config,
    session_type: Option<SessionType>,
    intention: Option<String>,
) -> CliResult {
    let runtime = tokio::runtime::Runtime::new()?;
    let db = Arc::new(db);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let controller = FocusController::with_engine(
        engine,
        Arc::clone(&db),
        clock,
        ControllerOptions::from_config(config),
    );
    let controller = match sync_adapter(config) {
        Some(adapter) => controller.with_sync(adapter),
        None => controller,
    };

    runtime.block_on(async {
        let mut events = controller.subscribe();
        match controller.state().await {
            TimerState::Idle => {
                controller.start(session_type, intention).await;
            }
            TimerState::Paused => {
                controller.resume().await;
            }
            TimerState::Running => controller.ensure_ticking().await,
            TimerState::Completed => {}
        }
        // Park the running phase so an interrupted run can be picked up later.
        save_engine(&db, &controller.engine().await)?;

        if controller.is_ticking() {
            let mut phase_over = false;
            loop {
                match events.recv().await {
                    Ok(event) => {
                        println!("{}", serde_json::to_string(&event)?);
                        if event.ends_phase() && event.record().is_none() {
                            break;
                        }
                        phase_over |= event.ends_phase();
                        // The record is settled once stats or a failure follows.
                        if phase_over
                            && matches!(event, Event::StatsUpdated { .. } | Event::PersistenceFailed { .. })
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "event output lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        } else {
            println!("{}", serde_json::to_string(&controller.snapshot().await)?);
        }

        let unsaved = controller.shutdown().await;
        save_engine(&db, &controller.engine().await)?;
        if unsaved > 0 {
            return Err(format!("{unsaved} session(s) could not be saved").into());
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn sync_adapter(config: &Config) -> Option<Arc<wellfocus_core::SyncAdapter>> {
    if !config.sync.enabled {
        return None;
    }
    match wellfocus_core::SyncAdapter::from_config(&config.sync) {
        Ok(adapter) => Some(Arc::new(adapter)),
        Err(e) => {
            tracing::warn!(error = %e, "sync disabled for this run");
            None
        }
    }
}
