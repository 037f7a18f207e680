//! Stale-participant sweep.
//!
//! Clients write server-stamped heartbeats while present; this task walks
//! every room and evicts participants whose heartbeat is missing or older
//! than the inactivity threshold. Eviction removes the participant entry,
//! the room presence record, the typing flag, and the heartbeat itself, so
//! a crashed client leaves nothing behind.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing;

use studyhub_core::AppResult;
use studyhub_core::config::room::RoomConfig;
use studyhub_core::traits::store::PresenceStore;
use studyhub_core::types::{RoomId, UserId};
use studyhub_store::paths;
use studyhub_store::paths::MutationIntent;

/// Sweep every room once. Returns the number of evicted participants.
pub async fn sweep_stale_participants(
    store: &Arc<dyn PresenceStore>,
    config: &RoomConfig,
) -> AppResult<u32> {
    let Some(rooms) = store.get(&paths::rooms()).await? else {
        return Ok(0);
    };
    let Some(rooms) = rooms.as_object() else {
        return Ok(0);
    };

    let now = store.server_now();
    let threshold = Duration::seconds(config.inactivity_threshold_seconds as i64);
    let mut evicted = 0;

    for (room_key, room_doc) in rooms {
        let Ok(room) = room_key.parse::<RoomId>() else {
            tracing::warn!(room = %room_key, "unparseable room key skipped");
            continue;
        };
        for uid in stale_participants(room_doc, now, threshold) {
            evict(store, room, uid).await;
            evicted += 1;
        }
    }

    if evicted > 0 {
        tracing::info!(evicted, "stale participants swept");
    }
    Ok(evicted)
}

/// Participants of one room document whose heartbeat is absent or older
/// than the threshold. Every participant is judged the same way; whoever
/// created the room gets no special treatment.
fn stale_participants(room_doc: &Value, now: DateTime<Utc>, threshold: Duration) -> Vec<UserId> {
    let Some(participants) = room_doc.get("participants").and_then(Value::as_object) else {
        return Vec::new();
    };
    let heartbeats = room_doc.get("heartbeats").and_then(Value::as_object);

    participants
        .keys()
        .filter_map(|key| key.parse::<UserId>().ok())
        .filter(|uid| {
            let beat = heartbeats
                .and_then(|map| map.get(&uid.to_string()))
                .and_then(|raw| serde_json::from_value::<DateTime<Utc>>(raw.clone()).ok());
            match beat {
                Some(at) => now - at > threshold,
                // No heartbeat at all: the client never got one out.
                None => true,
            }
        })
        .collect()
}

async fn evict(store: &Arc<dyn PresenceStore>, room: RoomId, uid: UserId) {
    tracing::info!(%room, %uid, "evicting stale participant");
    let intents = [
        MutationIntent::LeaveRoom { room, uid },
        MutationIntent::RemoveRoomPresence { room, uid },
        MutationIntent::ClearTyping { room, uid },
        MutationIntent::RemoveHeartbeat { room, uid },
    ];
    for intent in intents {
        match intent.resolve() {
            Ok(write) => {
                if let Err(e) = store.apply(write).await {
                    tracing::warn!(%room, %uid, "eviction write failed: {}", e);
                }
            }
            Err(e) => tracing::warn!(%room, %uid, "eviction intent failed to resolve: {}", e),
        }
    }
}
