//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod accounting;
pub mod chat;
pub mod ledger;
pub mod logging;
pub mod presence;
pub mod room;
pub mod timer;
pub mod worker;

use serde::{Deserialize, Serialize};

use self::accounting::AccountingConfig;
use self::chat::ChatConfig;
use self::ledger::LedgerConfig;
use self::logging::LoggingConfig;
use self::presence::PresenceConfig;
use self::room::RoomConfig;
use self::timer::TimerConfig;
use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Presence announcement settings.
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Time accounting settings.
    #[serde(default)]
    pub accounting: AccountingConfig,
    /// Shared session timer settings.
    #[serde(default)]
    pub timer: TimerConfig,
    /// Room membership settings.
    #[serde(default)]
    pub room: RoomConfig,
    /// Durable Ledger client settings.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Background sweep worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Private chat / unread badge settings.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `STUDYHUB_`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("STUDYHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
