//! HTTP client for the Durable Ledger API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use moka::future::Cache;
use serde::Serialize;
use uuid::Uuid;

use studyhub_core::config::ledger::LedgerConfig;
use studyhub_core::traits::ledger::{
    ChatMessage, LeaderboardEntry, LeaderboardTimeframe, LedgerApi, StudyStats,
};
use studyhub_core::types::RoomId;
use studyhub_core::{AppError, AppResult};

#[derive(Debug, Serialize)]
struct StudyUpdateBody<'a> {
    username: &'a str,
    minutes: u32,
    idempotency_key: Uuid,
}

/// `reqwest`-based Durable Ledger client.
///
/// Leaderboard reads are served from a short-lived cache (5–10s per the
/// API contract) so leaderboard UIs polling on every store event do not
/// hammer the slow path.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    base_url: String,
    leaderboard_cache: Cache<LeaderboardTimeframe, Arc<Vec<LeaderboardEntry>>>,
}

impl LedgerClient {
    /// Create a new client from configuration.
    pub fn new(config: &LedgerConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(
                    studyhub_core::error::ErrorKind::Ledger,
                    format!("Failed to build HTTP client: {e}"),
                    e,
                )
            })?;

        let leaderboard_cache = Cache::builder()
            .max_capacity(8)
            .time_to_live(Duration::from_secs(config.leaderboard_cache_seconds))
            .build();

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            leaderboard_cache,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_leaderboard(
        &self,
        timeframe: LeaderboardTimeframe,
    ) -> AppResult<Vec<LeaderboardEntry>> {
        let response = self
            .http
            .get(self.url("/leaderboard"))
            .query(&[("timeframe", timeframe.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(ledger_error)?;

        response.json().await.map_err(ledger_error)
    }
}

fn ledger_error(err: reqwest::Error) -> AppError {
    AppError::with_source(
        studyhub_core::error::ErrorKind::Ledger,
        format!("Ledger request failed: {err}"),
        err,
    )
}

#[async_trait]
impl LedgerApi for LedgerClient {
    async fn update_study(
        &self,
        username: &str,
        minutes: u32,
        idempotency_key: Uuid,
    ) -> AppResult<()> {
        self.http
            .post(self.url("/study/update"))
            .json(&StudyUpdateBody {
                username,
                minutes,
                idempotency_key,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(ledger_error)?;
        Ok(())
    }

    async fn study_stats(&self, username: &str) -> AppResult<StudyStats> {
        let response = self
            .http
            .get(self.url("/study/stats"))
            .query(&[("username", username)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(ledger_error)?;

        response.json().await.map_err(ledger_error)
    }

    async fn study_history(&self, username: &str) -> AppResult<BTreeMap<NaiveDate, u64>> {
        let response = self
            .http
            .get(self.url("/study/history"))
            .query(&[("username", username)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(ledger_error)?;

        response.json().await.map_err(ledger_error)
    }

    async fn leaderboard(
        &self,
        timeframe: LeaderboardTimeframe,
    ) -> AppResult<Vec<LeaderboardEntry>> {
        let entries = self
            .leaderboard_cache
            .try_get_with(timeframe, async {
                self.fetch_leaderboard(timeframe).await.map(Arc::new)
            })
            .await
            .map_err(|e: Arc<AppError>| (*e).clone())?;
        Ok((*entries).clone())
    }

    async fn send_chat(&self, message: &ChatMessage) -> AppResult<()> {
        self.http
            .post(self.url("/chat/send"))
            .json(message)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(ledger_error)?;
        Ok(())
    }

    async fn chat_history(
        &self,
        room: RoomId,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> AppResult<Vec<ChatMessage>> {
        let mut request = self
            .http
            .get(self.url("/chat/history"))
            .query(&[("room", room.to_string())])
            .query(&[("limit", limit)]);
        if let Some(before) = before {
            request = request.query(&[("before", before.to_rfc3339())]);
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(ledger_error)?;

        response.json().await.map_err(ledger_error)
    }
}
