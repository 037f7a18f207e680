//! Own-presence announcement.
//!
//! On every (re)connection the last-will cleanup is registered *before* any
//! presence field is written, so a crash between connect and the first real
//! update still cleans up. All presence writes are fire-and-forget: a
//! failed announce is logged, never retried, and heals on the next natural
//! re-announce.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing;

use studyhub_core::traits::store::ConnectionState;
use studyhub_entity::presence::{CommunityPresenceRecord, PresenceRecord, PresenceStatus};
use studyhub_store::paths;
use studyhub_store::paths::MutationIntent;

use crate::events::SyncEvent;
use crate::presence::dedup;
use crate::session::SessionContext;

/// Write the caller's presence records for the current connection.
///
/// Idempotent: repeated announces overwrite the same keys.
pub async fn announce(ctx: &SessionContext) {
    let store = ctx.store();
    let conn = store.connection_id();
    let uid = ctx.identity().uid;
    let now = store.server_now();

    // Last will first: community record flips offline and the room presence
    // record disappears if this connection drops.
    let wills = [
        MutationIntent::SetCommunityOffline {
            conn,
            last_seen: now,
        },
        MutationIntent::RemoveRoomPresence {
            room: ctx.room(),
            uid,
        },
    ];
    let mut resolved = Vec::with_capacity(wills.len());
    for intent in &wills {
        match intent.resolve() {
            Ok(write) => resolved.push(write),
            Err(e) => tracing::warn!("last-will intent failed to resolve: {}", e),
        }
    }
    if let Err(e) = store.on_disconnect(resolved).await {
        tracing::warn!("last-will registration failed: {}", e);
    }

    let identity = ctx.identity();
    ctx.fire(
        MutationIntent::AnnounceCommunity {
            conn,
            record: CommunityPresenceRecord {
                username: identity.username.clone(),
                status: PresenceStatus::Online,
                last_seen: now,
                status_text: ctx.config().presence.default_status_text.clone(),
                is_studying: ctx.is_studying(),
            },
        },
        "community announce",
    )
    .await;

    ctx.fire(
        MutationIntent::AnnounceRoomPresence {
            room: ctx.room(),
            uid,
            record: PresenceRecord {
                username: identity.username.clone(),
                photo_url: identity.photo_url.clone(),
                accumulated_seconds: ctx.mirror_seconds(),
                status: PresenceStatus::Online,
            },
        },
        "room presence announce",
    )
    .await;
}

/// Clean logout: remove the room record and flip the community record
/// offline explicitly instead of waiting for the last-will trigger, since a
/// logout is not a disconnect.
pub async fn logout(ctx: &SessionContext) {
    let store = ctx.store();
    ctx.fire(
        MutationIntent::RemoveRoomPresence {
            room: ctx.room(),
            uid: ctx.identity().uid,
        },
        "logout room presence removal",
    )
    .await;
    ctx.fire(
        MutationIntent::SetCommunityOffline {
            conn: store.connection_id(),
            last_seen: store.server_now(),
        },
        "logout community offline",
    )
    .await;
}

/// Spawn the announce loop: announce now if connected, then re-announce on
/// every transition back to connected.
pub fn spawn_announcer(ctx: &Arc<SessionContext>) {
    let task_ctx = Arc::clone(ctx);
    let handle = tokio::spawn(async move {
        let ctx = task_ctx;
        let mut state_rx = ctx.store().connection_state();
        let mut shutdown = ctx.shutdown_signal();

        if *state_rx.borrow() == ConnectionState::Connected {
            announce(&ctx).await;
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                changed = state_rx.changed() => {
                    if changed.is_err() || ctx.has_left() {
                        break;
                    }
                    if *state_rx.borrow() == ConnectionState::Connected {
                        announce(&ctx).await;
                    }
                }
            }
        }
    });
    ctx.track(handle);
}

/// Spawn the community feed watcher: recompute the canonical roster
/// wholesale on every feed change and emit it.
pub fn spawn_community_watcher(ctx: &Arc<SessionContext>) {
    let task_ctx = Arc::clone(ctx);
    let handle = tokio::spawn(async move {
        let ctx = task_ctx;
        let mut rx = match ctx.store().subscribe(&paths::community()).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::warn!("community feed subscription failed: {}", e);
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
                        let roster =
                            dedup::canonical_roster(dedup::parse_feed(event.value.as_ref()));
                        ctx.emit(SyncEvent::RosterChanged { roster });
                    }
                    // A lagged receiver only missed intermediate snapshots;
                    // the next event carries the full state.
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
    ctx.track(handle);
}
