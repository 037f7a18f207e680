//! Room liveness heartbeats.
//!
//! Each participant writes a server-stamped timestamp on a fixed interval.
//! The sweep worker compares those stamps against the inactivity threshold
//! and evicts silent participants; clients never judge each other's
//! liveness.

use std::sync::Arc;

use tokio::time;

use studyhub_store::paths::MutationIntent;

use crate::session::SessionContext;

/// Write one heartbeat for the session, stamped with the store's clock.
pub async fn beat(ctx: &SessionContext) {
    ctx.fire(
        MutationIntent::WriteHeartbeat {
            room: ctx.room(),
            uid: ctx.identity().uid,
            at: ctx.store().server_now(),
        },
        "heartbeat",
    )
    .await;
}

/// Spawn the heartbeat loop: one beat immediately, then one per interval.
pub fn spawn(ctx: &Arc<SessionContext>) {
    let task_ctx = Arc::clone(ctx);
    let handle = tokio::spawn(async move {
        let ctx = task_ctx;
        let period =
            std::time::Duration::from_secs(ctx.config().room.heartbeat_interval_seconds);
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        let mut shutdown = ctx.shutdown_signal();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    if ctx.has_left() {
                        break;
                    }
                    beat(&ctx).await;
                }
            }
        }
    });
    ctx.track(handle);
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    use studyhub_core::config::AppConfig;
    use studyhub_core::traits::ManualClock;
    use studyhub_core::types::{RoomId, UserId};
    use studyhub_ledger::MemoryLedger;
    use studyhub_store::{MemoryPresenceStore, paths};

    use crate::session::SessionIdentity;

    #[tokio::test]
    async fn test_beat_writes_server_stamped_timestamp() {
        let clock = Arc::new(ManualClock::starting_at(chrono::Utc::now()));
        let store = MemoryPresenceStore::new(Arc::clone(&clock) as _);
        let ledger = MemoryLedger::new(Arc::clone(&clock) as _);
        let ctx = SessionContext::new(
            SessionIdentity {
                uid: UserId::new(),
                username: "alice".to_string(),
                photo_url: None,
                is_beast_mode: false,
            },
            RoomId::new(),
            store.connect(),
            ledger,
            AppConfig::default(),
        );

        beat(&ctx).await;
        let first = store
            .read(&paths::heartbeat(ctx.room(), ctx.identity().uid))
            .expect("heartbeat written");

        clock.advance(Duration::seconds(60));
        beat(&ctx).await;
        let second = store
            .read(&paths::heartbeat(ctx.room(), ctx.identity().uid))
            .expect("heartbeat written");

        assert_ne!(first, second);
    }
}
