//! Room membership and typing indicators.
//!
//! The participant set lives in the store keyed by uid, so joining is
//! set-union and leaving is set-difference; repeating either is a no-op.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing;

use studyhub_core::AppResult;
use studyhub_entity::room::Participant;
use studyhub_store::paths;
use studyhub_store::paths::MutationIntent;

use crate::events::SyncEvent;
use crate::session::SessionContext;

/// Add the session's participant entry to the room.
///
/// This is the one presence write that is a hard error: without a
/// participant entry the session is not in the room at all.
pub async fn join(ctx: &SessionContext) -> AppResult<()> {
    let write = MutationIntent::JoinRoom {
        room: ctx.room(),
        participant: ctx.identity().participant(),
    }
    .resolve()?;
    ctx.store().apply(write).await
}

/// Remove the session's participant entry and its room-scoped leftovers.
pub async fn leave(ctx: &SessionContext) {
    let room = ctx.room();
    let uid = ctx.identity().uid;
    ctx.fire(MutationIntent::LeaveRoom { room, uid }, "participant removal")
        .await;
    ctx.fire(MutationIntent::ClearTyping { room, uid }, "typing cleanup")
        .await;
    ctx.fire(
        MutationIntent::RemoveHeartbeat { room, uid },
        "heartbeat cleanup",
    )
    .await;
}

/// Set or clear the session's typing indicator.
pub async fn set_typing(ctx: &SessionContext, typing: bool) {
    let room = ctx.room();
    let uid = ctx.identity().uid;
    let intent = if typing {
        MutationIntent::SetTyping { room, uid }
    } else {
        MutationIntent::ClearTyping { room, uid }
    };
    ctx.fire(intent, "typing indicator").await;
}

/// Parse the participants subtree (uid → participant) into a display list.
///
/// Malformed entries are discarded; output is sorted by username.
pub fn parse_participants(snapshot: Option<&Value>) -> Vec<Participant> {
    let Some(map) = snapshot.and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut participants: Vec<Participant> = map
        .values()
        .filter_map(|raw| serde_json::from_value(raw.clone()).ok())
        .collect();
    participants.sort_by(|a, b| a.username.cmp(&b.username));
    participants
}

/// Spawn the participant-set watcher: emit the recomputed list on every
/// change to the room's participants subtree.
pub fn spawn_watcher(ctx: &Arc<SessionContext>) {
    let task_ctx = Arc::clone(ctx);
    let handle = tokio::spawn(async move {
        let ctx = task_ctx;
        let mut rx = match ctx.store().subscribe(&paths::participants(ctx.room())).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::warn!("participants subscription failed: {}", e);
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
                        let participants = parse_participants(event.value.as_ref());
                        ctx.emit(SyncEvent::ParticipantsChanged { participants });
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
    ctx.track(handle);
}

#[cfg(test)]
mod tests {
    use super::*;

    use studyhub_core::config::AppConfig;
    use studyhub_core::traits::SystemClock;
    use studyhub_core::types::{RoomId, UserId};
    use studyhub_ledger::MemoryLedger;
    use studyhub_store::MemoryPresenceStore;

    use crate::session::SessionIdentity;

    fn test_session(store: &Arc<MemoryPresenceStore>, username: &str) -> Arc<SessionContext> {
        let ledger = MemoryLedger::new(Arc::new(SystemClock));
        SessionContext::new(
            SessionIdentity {
                uid: UserId::new(),
                username: username.to_string(),
                photo_url: None,
                is_beast_mode: false,
            },
            RoomId::new(),
            store.connect(),
            ledger,
            AppConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_double_join_leaves_one_entry() {
        let store = MemoryPresenceStore::new(Arc::new(SystemClock));
        let ctx = test_session(&store, "alice");

        join(&ctx).await.expect("first join");
        join(&ctx).await.expect("second join");

        let snapshot = store
            .read(&paths::participants(ctx.room()))
            .expect("participants present");
        let participants = parse_participants(Some(&snapshot));
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].username, "alice");
    }

    #[tokio::test]
    async fn test_leave_removes_entry_and_room_leftovers() {
        let store = MemoryPresenceStore::new(Arc::new(SystemClock));
        let ctx = test_session(&store, "alice");

        join(&ctx).await.expect("join");
        set_typing(&ctx, true).await;
        leave(&ctx).await;

        let room = ctx.room();
        let uid = ctx.identity().uid;
        assert!(store.read(&paths::participant(room, uid)).is_none());
        assert!(store.read(&paths::typing(room, uid)).is_none());
        assert!(store.read(&paths::heartbeat(room, uid)).is_none());
    }

    #[tokio::test]
    async fn test_leave_without_join_is_a_no_op() {
        let store = MemoryPresenceStore::new(Arc::new(SystemClock));
        let ctx = test_session(&store, "alice");
        leave(&ctx).await;
        assert!(store.read(&paths::participants(ctx.room())).is_none());
    }

    #[test]
    fn test_parse_participants_discards_malformed_and_sorts() {
        let snapshot = serde_json::json!({
            "uid-b": {
                "uid": UserId::new(),
                "username": "bob",
                "isBeastMode": false,
            },
            "uid-a": {
                "uid": UserId::new(),
                "username": "alice",
                "isBeastMode": true,
            },
            "uid-bad": { "isBeastMode": true },
        });

        let participants = parse_participants(Some(&snapshot));
        let names: Vec<&str> = participants.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }
}
