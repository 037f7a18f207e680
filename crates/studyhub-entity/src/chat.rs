//! Private chat summary entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyhub_core::types::UserId;

/// The per-conversation summary stored in each participant's inbox.
///
/// One summary per conversation partner; the unread deduplicator compares
/// `last_message_timestamp` against the locally persisted watermark for the
/// partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateChatSummary {
    /// The conversation partner.
    pub partner_id: UserId,
    /// Server timestamp of the newest message in the conversation.
    pub last_message_timestamp: DateTime<Utc>,
    /// Who sent that newest message.
    pub last_sender_id: UserId,
}
