use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::stats::Stats;
use crate::timer::{SessionRecord, SessionType, TimerState};

/// Every state change in the engine produces an Event.
/// Subscribers (UI, notifier, sync) observe them; none can block the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    TimerStarted {
        session_type: SessionType,
        duration_secs: u64,
        intention: Option<String>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Periodic progress while running.
    Tick {
        session_type: SessionType,
        remaining_secs: u64,
        total_secs: u64,
        progress: f64,
        at: DateTime<Utc>,
    },
    /// Phase ran to zero.
    TimerCompleted {
        record: SessionRecord,
        next_session_type: SessionType,
        at: DateTime<Utc>,
    },
    /// Phase ended early by the user; the engine is already idle on the next phase.
    TimerSkipped {
        record: SessionRecord,
        next_session_type: SessionType,
        at: DateTime<Utc>,
    },
    /// `completed -> idle`, next phase pre-selected.
    PhaseAdvanced {
        next_session_type: SessionType,
        at: DateTime<Utc>,
    },
    /// Back to idle. Carries a record only if a phase was abandoned.
    TimerReset {
        record: Option<SessionRecord>,
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        settings: Settings,
        at: DateTime<Utc>,
    },
    StatsUpdated {
        stats: Stats,
        at: DateTime<Utc>,
    },
    /// A record could not be made durable. It stays queued for retry.
    PersistenceFailed {
        record_id: String,
        message: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        session_type: SessionType,
        remaining_secs: u64,
        total_secs: u64,
        progress: f64,
        intention: Option<String>,
        next_session_type: SessionType,
        focus_session_count: u64,
        completed_focus_sessions: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The session record this event appends to the log, if any.
    pub fn record(&self) -> Option<&SessionRecord> {
        match self {
            Event::TimerCompleted { record, .. } | Event::TimerSkipped { record, .. } => Some(record),
            Event::TimerReset { record, .. } => record.as_ref(),
            _ => None,
        }
    }

    /// Whether the active phase is over after this event.
    pub fn ends_phase(&self) -> bool {
        matches!(
            self,
            Event::TimerCompleted { .. } | Event::TimerSkipped { .. } | Event::TimerReset { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn events_are_tagged_camel_case() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let json = serde_json::to_value(Event::PhaseAdvanced {
            next_session_type: SessionType::LongBreak,
            at,
        })
        .unwrap();
        assert_eq!(json["type"], "phaseAdvanced");
        assert_eq!(json["nextSessionType"], "longBreak");
    }

    #[test]
    fn reset_without_record_has_nothing_to_log() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let event = Event::TimerReset { record: None, at };
        assert!(event.record().is_none());
        assert!(event.ends_phase());
    }
}
