//! Background sweep worker configuration.

use serde::{Deserialize, Serialize};

/// Settings for the cron-owned sweep worker.
///
/// Sweeping is deliberately *not* run by any client: a room owner's tab
/// going away must not stop cleanup, so the worker owns the schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron schedule for the participant inactivity sweep.
    #[serde(default = "default_sweep_schedule")]
    pub sweep_schedule: String,
    /// Cron schedule for the community presence reconciliation job.
    #[serde(default = "default_reconcile_schedule")]
    pub reconcile_schedule: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_schedule: default_sweep_schedule(),
            reconcile_schedule: default_reconcile_schedule(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sweep_schedule() -> String {
    // Every minute.
    "0 * * * * *".to_string()
}

fn default_reconcile_schedule() -> String {
    // Every five minutes.
    "0 */5 * * * *".to_string()
}
