//! Durable Ledger client configuration.

use serde::{Deserialize, Serialize};

/// Settings for the Durable Ledger HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the ledger API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// How long leaderboard responses may be served from cache, in seconds.
    #[serde(default = "default_leaderboard_cache")]
    pub leaderboard_cache_seconds: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_timeout(),
            leaderboard_cache_seconds: default_leaderboard_cache(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_leaderboard_cache() -> u64 {
    8
}
