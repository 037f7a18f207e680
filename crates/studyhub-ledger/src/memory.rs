//! In-memory Durable Ledger for tests and single-process runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use studyhub_core::traits::Clock;
use studyhub_core::traits::ledger::{
    ChatMessage, LeaderboardEntry, LeaderboardTimeframe, LedgerApi, StudyStats,
};
use studyhub_core::types::RoomId;
use studyhub_core::{AppError, AppResult};

/// In-memory ledger with the same observable contract as the HTTP API,
/// including idempotency-key deduplication on study updates.
///
/// Supports failure injection so tests can exercise the flush-retry path.
#[derive(Debug)]
pub struct MemoryLedger {
    clock: Arc<dyn Clock>,
    totals: DashMap<String, u64>,
    logs: DashMap<String, BTreeMap<NaiveDate, u64>>,
    applied_keys: DashSet<Uuid>,
    chats: Mutex<Vec<ChatMessage>>,
    /// Number of upcoming `update_study` calls to reject.
    fail_updates: AtomicU32,
}

impl MemoryLedger {
    /// Create an empty ledger on the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            totals: DashMap::new(),
            logs: DashMap::new(),
            applied_keys: DashSet::new(),
            chats: Mutex::new(Vec::new()),
            fail_updates: AtomicU32::new(0),
        })
    }

    /// Make the next `count` study updates fail without applying.
    pub fn fail_next_updates(&self, count: u32) {
        self.fail_updates.store(count, Ordering::SeqCst);
    }

    /// Current accepted total for a user.
    pub fn total_minutes(&self, username: &str) -> u64 {
        self.totals.get(username).map(|r| *r.value()).unwrap_or(0)
    }

    fn take_failure(&self) -> bool {
        self.fail_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LedgerApi for MemoryLedger {
    async fn update_study(
        &self,
        username: &str,
        minutes: u32,
        idempotency_key: Uuid,
    ) -> AppResult<()> {
        if self.take_failure() {
            return Err(AppError::ledger("injected update failure"));
        }
        // A key already applied is acknowledged without effect.
        if !self.applied_keys.insert(idempotency_key) {
            return Ok(());
        }

        *self.totals.entry(username.to_string()).or_insert(0) += u64::from(minutes);
        let today = self.clock.now().date_naive();
        *self
            .logs
            .entry(username.to_string())
            .or_default()
            .entry(today)
            .or_insert(0) += u64::from(minutes);
        Ok(())
    }

    async fn study_stats(&self, username: &str) -> AppResult<StudyStats> {
        Ok(StudyStats {
            total_minutes: self.total_minutes(username),
        })
    }

    async fn study_history(&self, username: &str) -> AppResult<BTreeMap<NaiveDate, u64>> {
        Ok(self
            .logs
            .get(username)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn leaderboard(
        &self,
        timeframe: LeaderboardTimeframe,
    ) -> AppResult<Vec<LeaderboardEntry>> {
        let today = self.clock.now().date_naive();
        let cutoff = match timeframe {
            LeaderboardTimeframe::Daily => Some(today),
            LeaderboardTimeframe::Weekly => Some(today - Duration::days(6)),
            LeaderboardTimeframe::All => None,
        };

        let mut entries: Vec<LeaderboardEntry> = self
            .logs
            .iter()
            .map(|r| {
                let minutes = r
                    .value()
                    .iter()
                    .filter(|(date, _)| cutoff.is_none_or(|c| **date >= c))
                    .map(|(_, m)| m)
                    .sum();
                LeaderboardEntry {
                    username: r.key().clone(),
                    total_minutes: minutes,
                    photo_url: None,
                }
            })
            .filter(|e| e.total_minutes > 0)
            .collect();

        entries.sort_by(|a, b| {
            b.total_minutes
                .cmp(&a.total_minutes)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(entries)
    }

    async fn send_chat(&self, message: &ChatMessage) -> AppResult<()> {
        let mut chats = self.chats.lock().unwrap_or_else(|e| e.into_inner());
        chats.push(message.clone());
        Ok(())
    }

    async fn chat_history(
        &self,
        room: RoomId,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> AppResult<Vec<ChatMessage>> {
        let chats = self.chats.lock().unwrap_or_else(|e| e.into_inner());
        let mut page: Vec<ChatMessage> = chats
            .iter()
            .filter(|m| m.room == room)
            .filter(|m| before.is_none_or(|cursor| m.sent_at < cursor))
            .cloned()
            .collect();
        // Newest page first, oldest-first within the page.
        page.sort_by_key(|m| std::cmp::Reverse(m.sent_at));
        page.truncate(limit as usize);
        page.reverse();
        Ok(page)
    }
}
