//! Shared room timer entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyhub_core::config::timer::TimerConfig;

/// The phase the shared timer is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    /// Focused study phase.
    Study,
    /// Short break between study sessions.
    ShortBreak,
    /// Long break after a full cycle of study sessions.
    LongBreak,
}

impl TimerMode {
    /// Converts to string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Study => "study",
            Self::ShortBreak => "shortBreak",
            Self::LongBreak => "longBreak",
        }
    }
}

/// The room-scoped shared timer document.
///
/// Every client derives the live countdown locally from `start_time`; no
/// per-second messages are exchanged. All timestamps are server-assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomTimerState {
    /// Current phase.
    pub mode: TimerMode,
    /// Remaining-seconds baseline. While inactive this is the displayed
    /// value verbatim; while active it is the baseline the countdown was
    /// started from.
    pub time: u32,
    /// Whether the countdown is running.
    pub is_active: bool,
    /// Server-assigned instant the countdown was last started, or `None`
    /// while paused or freshly switched.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Study phase length in seconds.
    pub study_duration: u32,
    /// Short break length in seconds.
    pub short_break_duration: u32,
    /// Long break length in seconds.
    pub long_break_duration: u32,
    /// Completed study sessions in the current cycle; drives the long-break
    /// rule. Lives in the shared document so the cycle survives whichever
    /// client happens to write the next transition.
    #[serde(default)]
    pub completed_study_sessions: u32,
}

impl RoomTimerState {
    /// A fresh inactive study timer with durations from configuration.
    pub fn from_config(config: &TimerConfig) -> Self {
        Self {
            mode: TimerMode::Study,
            time: config.study_duration_seconds,
            is_active: false,
            start_time: None,
            study_duration: config.study_duration_seconds,
            short_break_duration: config.short_break_seconds,
            long_break_duration: config.long_break_seconds,
            completed_study_sessions: 0,
        }
    }

    /// The configured length of a phase.
    pub fn duration_for(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Study => self.study_duration,
            TimerMode::ShortBreak => self.short_break_duration,
            TimerMode::LongBreak => self.long_break_duration,
        }
    }

    /// The remaining seconds every client displays at `now`.
    ///
    /// While active: `max(0, baseline − (now − start_time))`, where the
    /// baseline is the `time` field the countdown was started with. While
    /// inactive: the stored `time` verbatim. A missing `start_time` on an
    /// active document is treated as "just started".
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u32 {
        if !self.is_active {
            return self.time;
        }
        let Some(start) = self.start_time else {
            return self.time;
        };
        let elapsed = (now - start).num_seconds().max(0);
        u64::from(self.time).saturating_sub(elapsed as u64) as u32
    }
}
