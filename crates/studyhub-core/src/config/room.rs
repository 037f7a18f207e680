//! Room membership configuration.

use serde::{Deserialize, Serialize};

/// Settings for room membership and the heartbeat/sweep cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Interval in seconds between heartbeat writes by each present client.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Seconds without a heartbeat before a participant is swept.
    #[serde(default = "default_inactivity_threshold")]
    pub inactivity_threshold_seconds: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            inactivity_threshold_seconds: default_inactivity_threshold(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_inactivity_threshold() -> u64 {
    120
}
