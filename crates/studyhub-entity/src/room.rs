//! Room membership entity models.

use serde::{Deserialize, Serialize};

use studyhub_core::types::UserId;

/// One member of a room's participant set.
///
/// Membership is set-valued and keyed by `uid`: the store path for a
/// participant embeds the uid, so concurrent joins collapse onto the same
/// key instead of producing duplicate or phantom entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// The user's identifier.
    pub uid: UserId,
    /// Display name.
    pub username: String,
    /// Avatar URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Whether the user has beast mode (distraction lock) enabled.
    #[serde(default)]
    pub is_beast_mode: bool,
}
