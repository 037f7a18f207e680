//! Presence announcement configuration.

use serde::{Deserialize, Serialize};

/// Settings for the presence synchronizer and the community presence feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Seconds after which a community presence record with no heartbeat
    /// is considered stale and flipped offline by the reconciliation job.
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
    /// Default status text written on first announce.
    #[serde(default)]
    pub default_status_text: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            stale_after_seconds: default_stale_after(),
            default_status_text: String::new(),
        }
    }
}

fn default_stale_after() -> u64 {
    300
}
