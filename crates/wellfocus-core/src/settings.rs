//! Phase durations and break cadence.
//!
//! Settings change only through [`Settings::apply`], which validates a
//! [`SettingsPatch`] as a whole before merging it: one bad field rejects the
//! entire patch and the current values stay as they were.

use serde::{Deserialize, Serialize};

use crate::error::ConfigValidationError;
use crate::timer::SessionType;

/// Accepted range for every phase duration, in minutes.
pub const DURATION_RANGE_MIN: (i64, i64) = (1, 240);
/// Accepted range for the number of focus phases before a long break.
pub const CADENCE_RANGE: (i64, i64) = (1, 12);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Focus phase length in minutes.
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u32,
    #[serde(default = "default_short_break")]
    pub short_break_duration: u32,
    #[serde(default = "default_long_break")]
    pub long_break_duration: u32,
    #[serde(default = "default_sessions_before_long_break")]
    pub sessions_before_long_break: u32,
}

fn default_focus_duration() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_sessions_before_long_break() -> u32 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_duration: default_focus_duration(),
            short_break_duration: default_short_break(),
            long_break_duration: default_long_break(),
            sessions_before_long_break: default_sessions_before_long_break(),
        }
    }
}

/// Partial settings update. Absent fields are left untouched.
///
/// Values are signed so that nonsense like a negative duration can be
/// represented, and rejected, instead of failing to deserialize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub focus_duration: Option<i64>,
    pub short_break_duration: Option<i64>,
    pub long_break_duration: Option<i64>,
    pub sessions_before_long_break: Option<i64>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Settings {
    /// Configured length of a phase, in seconds.
    pub fn duration_secs(&self, session_type: SessionType) -> u64 {
        let minutes = match session_type {
            SessionType::Focus => self.focus_duration,
            SessionType::ShortBreak => self.short_break_duration,
            SessionType::LongBreak => self.long_break_duration,
        };
        u64::from(minutes).saturating_mul(60)
    }

    /// Check every field against its range.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        check("focusDuration", self.focus_duration.into(), DURATION_RANGE_MIN)?;
        check("shortBreakDuration", self.short_break_duration.into(), DURATION_RANGE_MIN)?;
        check("longBreakDuration", self.long_break_duration.into(), DURATION_RANGE_MIN)?;
        check(
            "sessionsBeforeLongBreak",
            self.sessions_before_long_break.into(),
            CADENCE_RANGE,
        )?;
        Ok(())
    }

    /// Merge a patch. On error nothing is changed.
    pub fn apply(&mut self, patch: &SettingsPatch) -> Result<(), ConfigValidationError> {
        let merged = self.merged(patch)?;
        *self = merged;
        Ok(())
    }

    /// The settings that `patch` would produce, without changing `self`.
    pub fn merged(&self, patch: &SettingsPatch) -> Result<Settings, ConfigValidationError> {
        let focus = field("focusDuration", patch.focus_duration, self.focus_duration, DURATION_RANGE_MIN)?;
        let short = field(
            "shortBreakDuration",
            patch.short_break_duration,
            self.short_break_duration,
            DURATION_RANGE_MIN,
        )?;
        let long = field(
            "longBreakDuration",
            patch.long_break_duration,
            self.long_break_duration,
            DURATION_RANGE_MIN,
        )?;
        let every = field(
            "sessionsBeforeLongBreak",
            patch.sessions_before_long_break,
            self.sessions_before_long_break,
            CADENCE_RANGE,
        )?;
        Ok(Settings {
            focus_duration: focus,
            short_break_duration: short,
            long_break_duration: long,
            sessions_before_long_break: every,
        })
    }
}

fn check(field: &'static str, value: i64, (min, max): (i64, i64)) -> Result<(), ConfigValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn field(
    name: &'static str,
    update: Option<i64>,
    current: u32,
    range: (i64, i64),
) -> Result<u32, ConfigValidationError> {
    match update {
        None => Ok(current),
        Some(value) => {
            check(name, value, range)?;
            // In range, so the cast is lossless.
            Ok(value as u32)
        }
    }
}
