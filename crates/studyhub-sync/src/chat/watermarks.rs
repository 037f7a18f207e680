//! Per-conversation read watermarks.
//!
//! A watermark is the timestamp of the newest message the local user has
//! seen in a conversation. Watermarks are device-local state, persisted as
//! a small JSON file: losing the file only re-marks conversations unread,
//! so persistence failures are logged and never block anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing;

use studyhub_core::types::UserId;

/// Device-local read watermarks, keyed by conversation partner.
#[derive(Debug)]
pub struct WatermarkStore {
    path: PathBuf,
    map: Mutex<HashMap<UserId, DateTime<Utc>>>,
}

impl WatermarkStore {
    /// Load watermarks from the given file. A missing or unreadable file
    /// yields an empty store.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let map = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "corrupt watermark file ignored: {}", e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "watermark file unreadable: {}", e);
                HashMap::new()
            }
        };
        Self {
            path,
            map: Mutex::new(map),
        }
    }

    /// The watermark for a conversation, if any.
    pub fn get(&self, partner: UserId) -> Option<DateTime<Utc>> {
        let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&partner).copied()
    }

    /// Advance a conversation's watermark. Watermarks only move forward; an
    /// older timestamp is ignored so a stale caller cannot un-read messages.
    pub async fn advance(&self, partner: UserId, seen_at: DateTime<Utc>) {
        let snapshot = {
            let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
            match map.get(&partner) {
                Some(current) if *current >= seen_at => return,
                _ => {
                    map.insert(partner, seen_at);
                }
            }
            map.clone()
        };
        self.persist(&snapshot).await;
    }

    async fn persist(&self, snapshot: &HashMap<UserId, DateTime<Utc>>) {
        let bytes = match serde_json::to_vec_pretty(snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("watermark serialization failed: {}", e);
                return;
            }
        };
        if let Some(parent) = self.path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!(path = %self.path.display(), "watermark dir creation failed: {}", e);
            return;
        }
        if let Err(e) = tokio::fs::write(&self.path, bytes).await {
            tracing::warn!(path = %self.path.display(), "watermark persist failed: {}", e);
        }
    }
}
