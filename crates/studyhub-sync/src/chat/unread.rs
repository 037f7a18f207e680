//! Unread conversation tracking.
//!
//! The inbox subtree carries one summary per conversation partner; the
//! tracker recomputes the unread badge set wholesale on every change. A
//! conversation is unread when its last message is newer than the local
//! read watermark and was not sent by the local user.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing;

use studyhub_core::types::UserId;
use studyhub_entity::chat::PrivateChatSummary;
use studyhub_store::paths;

use crate::chat::watermarks::WatermarkStore;
use crate::events::SyncEvent;
use crate::session::SessionContext;

/// Tracks which private conversations have unread messages.
#[derive(Debug)]
pub struct UnreadTracker {
    ctx: Arc<SessionContext>,
    watermarks: Arc<WatermarkStore>,
    /// Latest inbox snapshot, kept so opening a conversation can recompute
    /// without a store round-trip.
    latest: Mutex<Vec<PrivateChatSummary>>,
}

impl UnreadTracker {
    /// Create a tracker over the session's inbox.
    pub fn new(ctx: Arc<SessionContext>, watermarks: Arc<WatermarkStore>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            watermarks,
            latest: Mutex::new(Vec::new()),
        })
    }

    /// The local read watermarks.
    pub fn watermarks(&self) -> &Arc<WatermarkStore> {
        &self.watermarks
    }

    /// Partners with unread conversations, newest first.
    pub fn unread_partners(&self) -> Vec<UserId> {
        let summaries = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        self.compute_unread(&summaries)
    }

    /// Mark a conversation read up to its latest message and re-emit the
    /// badge set.
    pub async fn open_conversation(&self, partner: UserId) {
        let seen_at = {
            let summaries = self.latest.lock().unwrap_or_else(|e| e.into_inner());
            summaries
                .iter()
                .find(|s| s.partner_id == partner)
                .map(|s| s.last_message_timestamp)
        };
        if let Some(seen_at) = seen_at {
            self.watermarks.advance(partner, seen_at).await;
        }
        let partners = self.unread_partners();
        self.ctx.emit(SyncEvent::UnreadChanged { partners });
    }

    fn compute_unread(&self, summaries: &[PrivateChatSummary]) -> Vec<UserId> {
        let me = self.ctx.identity().uid;
        let mut unread: Vec<&PrivateChatSummary> = summaries
            .iter()
            .filter(|s| {
                s.last_sender_id != me
                    && self
                        .watermarks
                        .get(s.partner_id)
                        .is_none_or(|seen| s.last_message_timestamp > seen)
            })
            .collect();
        unread.sort_by(|a, b| b.last_message_timestamp.cmp(&a.last_message_timestamp));
        unread.iter().map(|s| s.partner_id).collect()
    }

    fn ingest(&self, snapshot: Option<&Value>) -> Vec<UserId> {
        let summaries = parse_inbox(snapshot);
        {
            let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
            *latest = summaries;
        }
        self.unread_partners()
    }

    /// Spawn the inbox watcher.
    pub fn spawn(self: &Arc<Self>) {
        let tracker = Arc::clone(self);
        let ctx = Arc::clone(&self.ctx);
        let handle = tokio::spawn(async move {
            let uid = ctx.identity().uid;
            let mut rx = match ctx.store().subscribe(&paths::inbox(uid)).await {
                Ok(rx) => rx,
                Err(e) => {
                    tracing::warn!("inbox subscription failed: {}", e);
                    return;
                }
            };
            let mut shutdown = ctx.shutdown_signal();

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    event = rx.recv() => match event {
                        Ok(event) => {
                            if ctx.has_left() {
                                break;
                            }
                            let partners = tracker.ingest(event.value.as_ref());
                            ctx.emit(SyncEvent::UnreadChanged { partners });
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });
        self.ctx.track(handle);
    }
}

/// Parse the inbox subtree (partner uid → summary), discarding malformed
/// entries.
pub fn parse_inbox(snapshot: Option<&Value>) -> Vec<PrivateChatSummary> {
    let Some(map) = snapshot.and_then(Value::as_object) else {
        return Vec::new();
    };
    map.values()
        .filter_map(|raw| serde_json::from_value(raw.clone()).ok())
        .collect()
}
