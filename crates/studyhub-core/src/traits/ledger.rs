//! Durable Ledger trait and its wire types.
//!
//! The ledger is the authoritative relational store, reachable only through
//! request/response HTTP calls. Everything here is slow-path: the fast-path
//! live view lives in the Presence Store and is cosmetic by comparison.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::AppResult;
use crate::types::{RoomId, UserId};

/// Aggregate study totals for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyStats {
    /// Total accepted study minutes across all time.
    pub total_minutes: u64,
}

/// Leaderboard aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardTimeframe {
    /// Today only.
    Daily,
    /// The current week.
    Weekly,
    /// All time.
    All,
}

impl LeaderboardTimeframe {
    /// Query-string form of the timeframe.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::All => "all",
        }
    }
}

/// One ranked leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// Display name.
    pub username: String,
    /// Accepted minutes in the timeframe.
    pub total_minutes: u64,
    /// Avatar URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// A chat message as stored by the ledger's chat backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// The room the message was sent in.
    pub room: RoomId,
    /// Sending user.
    pub sender: UserId,
    /// Sender display name.
    pub username: String,
    /// Message body.
    pub text: String,
    /// Server-assigned send time.
    pub sent_at: DateTime<Utc>,
}

/// Trait for the Durable Ledger API.
///
/// Implemented by the HTTP client in `studyhub-ledger` and by the in-memory
/// ledger used in tests and single-process runs.
#[async_trait]
pub trait LedgerApi: Send + Sync + fmt::Debug + 'static {
    /// Add accepted study minutes for a user.
    ///
    /// Increments the user's monotonic `total_minutes` and upserts today's
    /// study-log row. The ledger deduplicates by `idempotency_key`: a key it
    /// has already applied is acknowledged without effect, so retried
    /// flushes cannot double-count.
    async fn update_study(
        &self,
        username: &str,
        minutes: u32,
        idempotency_key: Uuid,
    ) -> AppResult<()>;

    /// Read a user's aggregate study totals.
    async fn study_stats(&self, username: &str) -> AppResult<StudyStats>;

    /// Read a user's per-day study history.
    async fn study_history(&self, username: &str) -> AppResult<BTreeMap<NaiveDate, u64>>;

    /// Read the ranked leaderboard for a timeframe.
    async fn leaderboard(
        &self,
        timeframe: LeaderboardTimeframe,
    ) -> AppResult<Vec<LeaderboardEntry>>;

    /// Back up a chat message.
    async fn send_chat(&self, message: &ChatMessage) -> AppResult<()>;

    /// Read a page of chat history, oldest-first within the page.
    ///
    /// `before` is an exclusive cursor; `None` reads the newest page.
    async fn chat_history(
        &self,
        room: RoomId,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> AppResult<Vec<ChatMessage>>;
}
