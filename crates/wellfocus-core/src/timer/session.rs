use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest intention text kept, in characters.
pub const MAX_INTENTION_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionType {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub fn is_break(&self) -> bool {
        !matches!(self, SessionType::Focus)
    }

    /// Stable storage identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Focus => "focus",
            SessionType::ShortBreak => "shortBreak",
            SessionType::LongBreak => "longBreak",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "focus" => Some(SessionType::Focus),
            "shortBreak" | "short_break" | "short-break" => Some(SessionType::ShortBreak),
            "longBreak" | "long_break" | "long-break" => Some(SessionType::LongBreak),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionType::Focus => "Focus",
            SessionType::ShortBreak => "Short Break",
            SessionType::LongBreak => "Long Break",
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The phase currently on the clock. Owned solely by the engine.
///
/// Remaining time is derived, never decremented: running time is
/// `now - started_at - accumulated_pause - (current pause, if any)`,
/// measured in milliseconds so that many short pauses do not drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub session_type: SessionType,
    pub total_duration_secs: u64,
    /// Last observed remaining time. Only ever decreases.
    pub remaining_secs: u64,
    pub intention: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Sum of all finished pauses.
    pub accumulated_pause_ms: u64,
    /// Set while paused.
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
}

impl ActiveSession {
    pub fn new(
        session_type: SessionType,
        total_duration_secs: u64,
        intention: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_type,
            total_duration_secs,
            remaining_secs: total_duration_secs,
            intention: intention.map(|text| truncate_intention(&text)),
            started_at,
            accumulated_pause_ms: 0,
            paused_at: None,
        }
    }

    /// Milliseconds the countdown has actually run as of `now`.
    pub fn running_ms(&self, now: DateTime<Utc>) -> u64 {
        let span = ms_between(self.started_at, now);
        let open_pause = self.paused_at.map(|p| ms_between(p, now)).unwrap_or(0);
        span.saturating_sub(self.accumulated_pause_ms)
            .saturating_sub(open_pause)
    }

    pub fn accumulated_pause_secs(&self) -> u64 {
        self.accumulated_pause_ms / 1000
    }

    /// Remaining time as of `now`, never above the last observed value.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        if self.paused_at.is_some() {
            return self.remaining_secs;
        }
        let computed = self
            .total_duration_secs
            .saturating_sub(self.running_ms(now) / 1000);
        computed.min(self.remaining_secs)
    }

    /// Record `now` as observed, updating `remaining_secs`.
    pub fn sync(&mut self, now: DateTime<Utc>) -> u64 {
        self.remaining_secs = self.remaining_at(now);
        self.remaining_secs
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.total_duration_secs - self.remaining_secs
    }

    /// 0.0 .. 1.0 progress within the phase.
    pub fn progress(&self) -> f64 {
        progress(self.remaining_secs, self.total_duration_secs)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.sync(now);
        self.paused_at = Some(now);
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.paused_at.take() {
            self.accumulated_pause_ms = self
                .accumulated_pause_ms
                .saturating_add(ms_between(paused_at, now));
        }
    }

    /// Build the immutable log entry for this phase.
    pub fn into_record(self, was_interrupted: bool, completed_at: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4().to_string(),
            session_type: self.session_type,
            duration_secs: self.total_duration_secs - self.remaining_secs,
            was_interrupted,
            intention: self.intention.unwrap_or_default(),
            completed_at,
        }
    }
}

/// A finished or abandoned phase. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    /// Time actually run, not the nominal phase length.
    #[serde(rename = "durationSeconds")]
    pub duration_secs: u64,
    pub was_interrupted: bool,
    #[serde(default)]
    pub intention: String,
    pub completed_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_focus(&self) -> bool {
        self.session_type == SessionType::Focus
    }

    /// Focus phase that ran to its end.
    pub fn counts_toward_streak(&self) -> bool {
        self.is_focus() && !self.was_interrupted
    }
}

/// `1 - remaining/total`, clamped to [0, 1].
pub fn progress(remaining_secs: u64, total_secs: u64) -> f64 {
    if total_secs == 0 {
        return 0.0;
    }
    (1.0 - remaining_secs as f64 / total_secs as f64).clamp(0.0, 1.0)
}

pub fn truncate_intention(text: &str) -> String {
    text.trim().chars().take(MAX_INTENTION_CHARS).collect()
}

/// Milliseconds from `from` to `to`; zero if the clock went backwards.
fn ms_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_milliseconds()).unwrap_or(0)
}
