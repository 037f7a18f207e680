//! Shared session timer configuration.

use serde::{Deserialize, Serialize};

/// Default durations for the shared Pomodoro-style room timer.
///
/// These are the *initial* values for a newly created room timer document;
/// each room's durations can be edited afterwards and live in the shared
/// timer state itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Study session length in seconds.
    #[serde(default = "default_study")]
    pub study_duration_seconds: u32,
    /// Short break length in seconds.
    #[serde(default = "default_short_break")]
    pub short_break_seconds: u32,
    /// Long break length in seconds.
    #[serde(default = "default_long_break")]
    pub long_break_seconds: u32,
    /// Number of completed study sessions before a long break.
    #[serde(default = "default_cycle")]
    pub sessions_per_cycle: u32,
    /// Local display refresh interval in milliseconds.
    #[serde(default = "default_display_tick")]
    pub display_tick_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            study_duration_seconds: default_study(),
            short_break_seconds: default_short_break(),
            long_break_seconds: default_long_break(),
            sessions_per_cycle: default_cycle(),
            display_tick_ms: default_display_tick(),
        }
    }
}

fn default_study() -> u32 {
    1500
}

fn default_short_break() -> u32 {
    300
}

fn default_long_break() -> u32 {
    900
}

fn default_cycle() -> u32 {
    4
}

fn default_display_tick() -> u64 {
    1000
}
