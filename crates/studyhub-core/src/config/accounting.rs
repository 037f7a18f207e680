//! Time accounting configuration.

use serde::{Deserialize, Serialize};

/// Settings for the time accounting reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingConfig {
    /// Interval in seconds between accounting ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// Number of pending minutes that triggers a ledger flush.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold_minutes: u32,
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: default_tick_interval(),
            flush_threshold_minutes: default_flush_threshold(),
        }
    }
}

fn default_tick_interval() -> u64 {
    60
}

fn default_flush_threshold() -> u32 {
    5
}
