//! Explicit session context and the room session lifecycle.
//!
//! The context replaces any ambient "current room" state: it is created on
//! join, passed to every synchronizer, and torn down on leave. The
//! `has_left` guard is checked at the top of every subscription callback so
//! in-flight async work arriving after an intentional leave is a no-op
//! instead of resurrecting stale state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing;

use studyhub_core::AppResult;
use studyhub_core::config::AppConfig;
use studyhub_core::traits::ledger::LedgerApi;
use studyhub_core::traits::store::PresenceStore;
use studyhub_core::types::{RoomId, UserId};
use studyhub_entity::room::Participant;
use studyhub_store::paths::MutationIntent;

use crate::accounting::TimeAccountingReconciler;
use crate::chat::unread::UnreadTracker;
use crate::chat::watermarks::WatermarkStore;
use crate::events::SyncEvent;
use crate::presence;
use crate::room::{heartbeat, membership};
use crate::timer::TimerSynchronizer;

/// Buffer for the session's UI event channel.
const EVENT_BUFFER: usize = 256;

/// Who the local user is.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    /// The user's identifier.
    pub uid: UserId,
    /// Display name.
    pub username: String,
    /// Avatar URL, if any.
    pub photo_url: Option<String>,
    /// Whether beast mode is enabled.
    pub is_beast_mode: bool,
}

impl SessionIdentity {
    /// The participant entry this identity joins rooms as.
    pub fn participant(&self) -> Participant {
        Participant {
            uid: self.uid,
            username: self.username.clone(),
            photo_url: self.photo_url.clone(),
            is_beast_mode: self.is_beast_mode,
        }
    }
}

/// Shared context for one user's membership of one room.
#[derive(Debug)]
pub struct SessionContext {
    identity: SessionIdentity,
    room: RoomId,
    store: Arc<dyn PresenceStore>,
    ledger: Arc<dyn LedgerApi>,
    config: AppConfig,
    /// Set on intentional leave; checked before every callback body.
    has_left: AtomicBool,
    /// Whether a study session is currently accumulating.
    is_studying: AtomicBool,
    /// Local copy of the live accumulated-seconds mirror.
    mirror_seconds: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
    events_tx: broadcast::Sender<SyncEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionContext {
    /// Create a context for one user in one room.
    pub fn new(
        identity: SessionIdentity,
        room: RoomId,
        store: Arc<dyn PresenceStore>,
        ledger: Arc<dyn LedgerApi>,
        config: AppConfig,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        Arc::new(Self {
            identity,
            room,
            store,
            ledger,
            config,
            has_left: AtomicBool::new(false),
            is_studying: AtomicBool::new(false),
            mirror_seconds: AtomicU64::new(0),
            shutdown_tx,
            events_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// The local user's identity.
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// The joined room.
    pub fn room(&self) -> RoomId {
        self.room
    }

    /// The Presence Store connection.
    pub fn store(&self) -> &Arc<dyn PresenceStore> {
        &self.store
    }

    /// The Durable Ledger client.
    pub fn ledger(&self) -> &Arc<dyn LedgerApi> {
        &self.ledger
    }

    /// The application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Subscribe to the session's UI events.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events_tx.subscribe()
    }

    /// Emit a UI event. No subscribers is fine.
    pub(crate) fn emit(&self, event: SyncEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Whether the user has intentionally left the room.
    pub fn has_left(&self) -> bool {
        self.has_left.load(Ordering::SeqCst)
    }

    /// Flip the leave guard. Pending callbacks observe it and bail.
    pub(crate) fn mark_left(&self) {
        self.has_left.store(true, Ordering::SeqCst);
    }

    /// Whether a study session is accumulating.
    pub fn is_studying(&self) -> bool {
        self.is_studying.load(Ordering::SeqCst)
    }

    pub(crate) fn set_studying(&self, studying: bool) {
        self.is_studying.store(studying, Ordering::SeqCst);
    }

    /// The local copy of the accumulated-seconds mirror.
    pub fn mirror_seconds(&self) -> u64 {
        self.mirror_seconds.load(Ordering::SeqCst)
    }

    pub(crate) fn set_mirror_seconds(&self, seconds: u64) {
        self.mirror_seconds.store(seconds, Ordering::SeqCst);
    }

    /// Add to the local mirror copy; returns the new total.
    pub(crate) fn add_mirror_seconds(&self, delta: u64) -> u64 {
        self.mirror_seconds.fetch_add(delta, Ordering::SeqCst) + delta
    }

    /// A receiver that fires when the session shuts down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Track a spawned loop so teardown can abort it.
    pub(crate) fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(handle);
    }

    /// Resolve and apply a mutation intent, fire-and-forget.
    ///
    /// Failures are logged and never retried; the next natural event
    /// (reconnect, tick, poll) heals the view.
    pub(crate) async fn fire(&self, intent: MutationIntent, what: &str) {
        match intent.resolve() {
            Ok(write) => {
                if let Err(e) = self.store.apply(write).await {
                    tracing::warn!("{} write failed: {}", what, e);
                }
            }
            Err(e) => tracing::warn!("{} intent failed to resolve: {}", what, e),
        }
    }

    /// Stop all loops and drop all subscriptions.
    pub(crate) fn teardown(&self) {
        let _ = self.shutdown_tx.send(true);
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for handle in tasks.drain(..) {
            handle.abort();
        }
    }
}

/// One user's live membership of one room.
///
/// Owns the full lifecycle: `join` wires every synchronizer, `leave` tears
/// everything down in order (final accounting flush, membership removal,
/// explicit logout, task teardown).
#[derive(Debug)]
pub struct RoomSession {
    ctx: Arc<SessionContext>,
    accounting: Arc<TimeAccountingReconciler>,
    timer: TimerSynchronizer,
    unread: Arc<UnreadTracker>,
}

impl RoomSession {
    /// Join a room: ensure the shared timer document exists, add the
    /// participant, announce presence, and start all background loops.
    pub async fn join(
        identity: SessionIdentity,
        room: RoomId,
        store: Arc<dyn PresenceStore>,
        ledger: Arc<dyn LedgerApi>,
        config: AppConfig,
    ) -> AppResult<Self> {
        let ctx = SessionContext::new(identity, room, store, ledger, config);

        let timer = TimerSynchronizer::new(Arc::clone(&ctx));
        timer.ensure_document().await?;

        membership::join(&ctx).await?;
        // The first heartbeat lands with the participant entry; a sweep
        // firing before the heartbeat loop's first tick would otherwise see
        // a member with no heartbeat and evict it.
        heartbeat::beat(&ctx).await;

        presence::spawn_announcer(&ctx);
        presence::spawn_community_watcher(&ctx);
        membership::spawn_watcher(&ctx);
        heartbeat::spawn(&ctx);
        timer.spawn_display_loop();

        let watermarks =
            Arc::new(WatermarkStore::load(&ctx.config().chat.watermark_file).await);
        let unread = UnreadTracker::new(Arc::clone(&ctx), watermarks);
        unread.spawn();

        let accounting = TimeAccountingReconciler::new(Arc::clone(&ctx));

        tracing::info!(
            room = %ctx.room(),
            user = %ctx.identity().username,
            "joined room"
        );

        Ok(Self {
            ctx,
            accounting,
            timer,
            unread,
        })
    }

    /// The session context.
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    /// Subscribe to UI events.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.ctx.events()
    }

    /// The time accounting reconciler.
    pub fn accounting(&self) -> &Arc<TimeAccountingReconciler> {
        &self.accounting
    }

    /// The shared timer synchronizer.
    pub fn timer(&self) -> &TimerSynchronizer {
        &self.timer
    }

    /// The unread/notification tracker.
    pub fn unread(&self) -> &Arc<UnreadTracker> {
        &self.unread
    }

    /// Set or clear the local user's typing indicator.
    pub async fn set_typing(&self, typing: bool) {
        membership::set_typing(&self.ctx, typing).await;
    }

    /// Leave the room.
    ///
    /// Ordering matters: the leave guard goes up first so no callback can
    /// resurrect state, then pending minutes get a final flush, then the
    /// participant entry and presence records are removed explicitly (a
    /// clean leave is not a disconnect), and finally all loops stop.
    pub async fn leave(self) {
        self.ctx.mark_left();
        self.accounting.stop_session().await;
        membership::leave(&self.ctx).await;
        presence::logout(&self.ctx).await;
        self.ctx.teardown();

        tracing::info!(
            room = %self.ctx.room(),
            user = %self.ctx.identity().username,
            "left room"
        );
    }
}
