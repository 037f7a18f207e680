//! Shared test helpers for integration tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use studyhub_core::config::AppConfig;
use studyhub_core::traits::ManualClock;
use studyhub_core::traits::ledger::LedgerApi;
use studyhub_core::types::{RoomId, UserId};
use studyhub_ledger::MemoryLedger;
use studyhub_store::MemoryPresenceStore;
use studyhub_sync::{RoomSession, SessionIdentity, SyncEvent};

/// One simulated deployment: a shared store, a shared ledger, a manual
/// server clock, and one room that sessions join.
pub struct TestWorld {
    /// Manually advanced server clock
    pub clock: Arc<ManualClock>,
    /// The shared store (the "server" side)
    pub store: Arc<MemoryPresenceStore>,
    /// The shared in-memory ledger
    pub ledger: Arc<MemoryLedger>,
    /// The room every session in this world joins
    pub room: RoomId,
    /// Configuration handed to every session
    pub config: AppConfig,
}

impl TestWorld {
    /// Create a fresh world with test-friendly configuration.
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::starting_at(chrono::Utc::now()));
        let store = MemoryPresenceStore::new(Arc::clone(&clock) as _);
        let ledger = MemoryLedger::new(Arc::clone(&clock) as _);

        let mut config = AppConfig::default();
        // Fast display ticks so derived-countdown tests finish quickly.
        config.timer.display_tick_ms = 25;
        // Per-world watermark file so tests cannot see each other's state.
        config.chat.watermark_file = std::env::temp_dir()
            .join(format!("studyhub-test-{}", Uuid::new_v4()))
            .join("watermarks.json")
            .to_string_lossy()
            .into_owned();

        Self {
            clock,
            store,
            ledger,
            room: RoomId::new(),
            config,
        }
    }

    /// The identity a session with this username uses.
    pub fn identity(username: &str) -> SessionIdentity {
        SessionIdentity {
            uid: UserId::new(),
            username: username.to_string(),
            photo_url: None,
            is_beast_mode: false,
        }
    }

    /// Join the world's room as a new client connection.
    pub async fn join(&self, username: &str) -> RoomSession {
        self.join_as(Self::identity(username)).await
    }

    /// Join the world's room with a specific identity (for reconnect-style
    /// scenarios that reuse a uid).
    pub async fn join_as(&self, identity: SessionIdentity) -> RoomSession {
        RoomSession::join(
            identity,
            self.room,
            self.store.connect(),
            Arc::clone(&self.ledger) as Arc<dyn LedgerApi>,
            self.config.clone(),
        )
        .await
        .expect("join room")
    }
}

/// Wait for the first event matching the predicate, with a timeout.
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<SyncEvent>,
    mut matches: F,
) -> SyncEvent
where
    F: FnMut(&SyncEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
