//! Community presence reconciliation.
//!
//! Last-will mutations usually flip a community record offline when its
//! connection drops, but a store-side failure can leave a record claiming
//! "online" forever. This task flips records offline whose last-seen stamp
//! is older than the staleness threshold. The record is kept, not deleted;
//! the dedup layer already renders offline records correctly.

use std::sync::Arc;

use chrono::Duration;
use tracing;

use studyhub_core::AppResult;
use studyhub_core::config::presence::PresenceConfig;
use studyhub_core::traits::store::PresenceStore;
use studyhub_core::types::ConnectionId;
use studyhub_entity::presence::CommunityPresenceRecord;
use studyhub_store::paths;
use studyhub_store::paths::MutationIntent;

/// Flip stale "online" community records offline. Returns how many were
/// reconciled.
pub async fn reconcile_community(
    store: &Arc<dyn PresenceStore>,
    config: &PresenceConfig,
) -> AppResult<u32> {
    let Some(feed) = store.get(&paths::community()).await? else {
        return Ok(0);
    };
    let Some(feed) = feed.as_object() else {
        return Ok(0);
    };

    let now = store.server_now();
    let threshold = Duration::seconds(config.stale_after_seconds as i64);
    let mut reconciled = 0;

    for (conn_key, raw) in feed {
        let Ok(conn) = conn_key.parse::<ConnectionId>() else {
            tracing::warn!(conn = %conn_key, "unparseable connection key skipped");
            continue;
        };
        let Ok(record) = serde_json::from_value::<CommunityPresenceRecord>(raw.clone()) else {
            continue;
        };
        if !record.is_online() || now - record.last_seen <= threshold {
            continue;
        }

        tracing::info!(%conn, username = %record.username, "flipping stale record offline");
        let intent = MutationIntent::SetCommunityOffline {
            conn,
            // Keep the stamp the record already carries; the worker did not
            // see this user, it only noticed their absence.
            last_seen: record.last_seen,
        };
        match intent.resolve() {
            Ok(write) => match store.apply(write).await {
                Ok(()) => reconciled += 1,
                Err(e) => tracing::warn!(%conn, "reconcile write failed: {}", e),
            },
            Err(e) => tracing::warn!(%conn, "reconcile intent failed to resolve: {}", e),
        }
    }

    if reconciled > 0 {
        tracing::info!(reconciled, "stale community records reconciled");
    }
    Ok(reconciled)
}
