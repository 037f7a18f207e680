//! Presence entity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Online/offline status carried by presence records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// The connection behind the record is live.
    Online,
    /// The connection dropped or the user logged out.
    Offline,
}

impl PresenceStatus {
    /// Converts to string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// A user's room-scoped presence document.
///
/// Created on session join, mutated on every accounting tick, removed on
/// leave or disconnect (via the registered last-will).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    /// Display name.
    pub username: String,
    /// Avatar URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Live accumulated study seconds mirrored from the accounting tick.
    pub accumulated_seconds: u64,
    /// Always [`PresenceStatus::Online`] while the record exists.
    pub status: PresenceStatus,
}

/// A user's global presence document.
///
/// One raw record may exist per connection (tabs, devices, reconnect
/// races); the canonical per-user view is computed by the deduplicator and
/// never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityPresenceRecord {
    /// Display name. Records missing this field are malformed and are
    /// filtered out before deduplication.
    pub username: String,
    /// Online/offline status.
    pub status: PresenceStatus,
    /// Server timestamp of the last status change.
    pub last_seen: DateTime<Utc>,
    /// Free-form status line.
    #[serde(default)]
    pub status_text: String,
    /// Whether the user is currently in a study session.
    #[serde(default)]
    pub is_studying: bool,
}

impl CommunityPresenceRecord {
    /// Check whether this record reports the user online.
    pub fn is_online(&self) -> bool {
        self.status == PresenceStatus::Online
    }
}
