//! Focus timer state machine.
//!
//! The engine is a pure, wall-clock-based state machine. It owns no thread
//! and reads no clock: every command takes `now`, and the caller is
//! responsible for calling `tick()` periodically while running.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//! Running --tick(0 left)--> Completed --advance--> Idle (next type pre-selected)
//! Running|Paused --skip--> Idle (next type pre-selected, interrupted record)
//! Running|Paused --reset--> Idle (interrupted record)
//! Completed --reset--> Idle (no record)
//! ```
//!
//! Commands that the current state does not permit return `None` and change
//! nothing.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(settings);
//! engine.start(None, Some("Draft chapter 3".into()), clock.now());
//! // In a loop:
//! if let Some(event) = engine.tick(clock.now()) {
//!     // event.record() is ready to be appended to the session log.
//! }
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cadence::next_session_type;
use super::session::{progress, ActiveSession, SessionRecord, SessionType};
use crate::error::ConfigValidationError;
use crate::events::Event;
use crate::settings::{Settings, SettingsPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    /// Phase ran to zero; waiting for `advance` (or `reset`).
    Completed,
}

/// Core timer engine.
///
/// Serializable so that short-lived processes can park it between commands;
/// because remaining time derives from absolute timestamps, a restored
/// engine picks up exactly where wall-clock time says it should be.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    settings: Settings,
    state: TimerState,
    /// Type the next `start` uses when none is requested.
    next_session_type: SessionType,
    #[serde(default)]
    active: Option<ActiveSession>,
    /// Focus phases finished (naturally or skipped) since this engine was
    /// created. Drives the long-break cadence.
    #[serde(default)]
    focus_session_count: u64,
    /// Lifetime counter shown to the user.
    #[serde(default)]
    completed_focus_sessions: u64,
}

impl TimerEngine {
    /// Create an idle engine with focus pre-selected.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            state: TimerState::Idle,
            next_session_type: SessionType::Focus,
            active: None,
            focus_session_count: 0,
            completed_focus_sessions: 0,
        }
    }

    /// Seed the lifetime focus counter (e.g. from persisted state).
    pub fn with_completed_focus_sessions(mut self, count: u64) -> Self {
        self.completed_focus_sessions = count;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn next_session_type(&self) -> SessionType {
        self.next_session_type
    }

    pub fn focus_session_count(&self) -> u64 {
        self.focus_session_count
    }

    pub fn completed_focus_sessions(&self) -> u64 {
        self.completed_focus_sessions
    }

    /// Type shown to observers: the active phase, or the pre-selected one.
    pub fn session_type(&self) -> SessionType {
        self.active
            .as_ref()
            .map(|a| a.session_type)
            .unwrap_or(self.next_session_type)
    }

    pub fn total_secs(&self) -> u64 {
        match &self.active {
            Some(active) => active.total_duration_secs,
            None => self.settings.duration_secs(self.next_session_type),
        }
    }

    /// Remaining time as of `now`, without mutating the engine.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        match &self.active {
            Some(active) => active.remaining_at(now),
            None => self.total_secs(),
        }
    }

    /// 0.0 .. 1.0 progress within the current phase.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        progress(self.remaining_secs(now), self.total_secs())
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            state: self.state,
            session_type: self.session_type(),
            remaining_secs: self.remaining_secs(now),
            total_secs: self.total_secs(),
            progress: self.progress(now),
            intention: self.active.as_ref().and_then(|a| a.intention.clone()),
            next_session_type: self.next_session_type,
            focus_session_count: self.focus_session_count,
            completed_focus_sessions: self.completed_focus_sessions,
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a phase. Defaults to the pre-selected type. No-op unless idle.
    pub fn start(
        &mut self,
        session_type: Option<SessionType>,
        intention: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        if self.state != TimerState::Idle {
            debug!(state = ?self.state, "start ignored: timer not idle");
            return None;
        }
        let session_type = session_type.unwrap_or(self.next_session_type);
        let total = self.settings.duration_secs(session_type);
        let intention = intention.filter(|text| !text.trim().is_empty());
        let active = ActiveSession::new(session_type, total, intention, now);
        let event = Event::TimerStarted {
            session_type,
            duration_secs: total,
            intention: active.intention.clone(),
            at: now,
        };
        self.active = Some(active);
        self.state = TimerState::Running;
        info!(%session_type, duration_secs = total, "phase started");
        Some(event)
    }

    /// Freeze the countdown. Pausing at or past the due instant completes
    /// the phase instead.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        let active = self.active.as_mut()?;
        if active.sync(now) == 0 {
            return self.complete();
        }
        active.pause(now);
        self.state = TimerState::Paused;
        Some(Event::TimerPaused {
            remaining_secs: active.remaining_secs,
            at: now,
        })
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != TimerState::Paused {
            return None;
        }
        let active = self.active.as_mut()?;
        active.resume(now);
        self.state = TimerState::Running;
        Some(Event::TimerResumed {
            remaining_secs: active.remaining_secs,
            at: now,
        })
    }

    /// Call periodically. Returns `Some(Event::TimerCompleted)` when the
    /// phase reaches zero.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        let remaining = self.active.as_mut()?.sync(now);
        if remaining == 0 {
            return self.complete();
        }
        None
    }

    /// End the phase early, log it as interrupted, and move to the next
    /// phase in the cadence.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if !matches!(self.state, TimerState::Running | TimerState::Paused) {
            return None;
        }
        let mut active = self.active.take()?;
        active.sync(now);
        let record = active.into_record(true, now);
        let next = self.finish_phase(record.session_type);
        self.state = TimerState::Idle;
        info!(
            session_type = %record.session_type,
            duration_secs = record.duration_secs,
            next = %next,
            "phase skipped"
        );
        Some(Event::TimerSkipped {
            record,
            next_session_type: next,
            at: now,
        })
    }

    /// `completed -> idle` with the next phase pre-selected.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != TimerState::Completed {
            return None;
        }
        self.active = None;
        self.state = TimerState::Idle;
        Some(Event::PhaseAdvanced {
            next_session_type: self.next_session_type,
            at: now,
        })
    }

    /// Back to idle. A running or paused phase is logged as interrupted and
    /// does not count toward the cadence; the same type stays pre-selected.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<Event> {
        match self.state {
            TimerState::Idle => None,
            TimerState::Completed => {
                self.active = None;
                self.state = TimerState::Idle;
                Some(Event::TimerReset { record: None, at: now })
            }
            TimerState::Running | TimerState::Paused => {
                let mut active = self.active.take()?;
                active.sync(now);
                self.next_session_type = active.session_type;
                let record = active.into_record(true, now);
                self.state = TimerState::Idle;
                info!(
                    session_type = %record.session_type,
                    duration_secs = record.duration_secs,
                    "phase abandoned"
                );
                Some(Event::TimerReset {
                    record: Some(record),
                    at: now,
                })
            }
        }
    }

    /// Validate and merge a settings patch. The active phase keeps its
    /// length; the change applies from the next `start`.
    pub fn update_settings(
        &mut self,
        patch: &SettingsPatch,
        now: DateTime<Utc>,
    ) -> Result<Event, ConfigValidationError> {
        self.settings.apply(patch)?;
        info!(settings = ?self.settings, "settings updated");
        Ok(Event::SettingsUpdated {
            settings: self.settings,
            at: now,
        })
    }

    /// Replace settings wholesale (e.g. after loading them from storage).
    pub fn set_settings(&mut self, settings: Settings) -> Result<(), ConfigValidationError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete(&mut self) -> Option<Event> {
        let active = self.active.as_mut()?;
        active.remaining_secs = 0;
        let completed_at = due_at(active);
        let record = active.clone().into_record(false, completed_at);
        let next = self.finish_phase(record.session_type);
        self.state = TimerState::Completed;
        info!(
            session_type = %record.session_type,
            duration_secs = record.duration_secs,
            next = %next,
            "phase completed"
        );
        Some(Event::TimerCompleted {
            record,
            next_session_type: next,
            at: completed_at,
        })
    }

    /// Bump counters for a finished phase and pre-select the next type.
    fn finish_phase(&mut self, finished: SessionType) -> SessionType {
        if finished == SessionType::Focus {
            self.focus_session_count += 1;
            self.completed_focus_sessions += 1;
        }
        let next = next_session_type(
            finished,
            self.focus_session_count,
            self.settings.sessions_before_long_break,
        );
        debug!(focus_session_count = self.focus_session_count, %next, "cadence");
        self.next_session_type = next;
        next
    }
}

/// The instant a running phase reached zero. Ticks can arrive late (a
/// suspended process), so completion is stamped with this, not with `now`.
fn due_at(active: &ActiveSession) -> DateTime<Utc> {
    let run_ms = active.total_duration_secs.saturating_mul(1000);
    let ms = i64::try_from(run_ms.saturating_add(active.accumulated_pause_ms)).unwrap_or(i64::MAX);
    active
        .started_at
        .checked_add_signed(TimeDelta::milliseconds(ms))
        .unwrap_or(active.started_at)
}
