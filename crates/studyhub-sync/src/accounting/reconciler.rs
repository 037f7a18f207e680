//! Time accounting reconciler.
//!
//! Ticks a local counter on a fixed interval, mirrors it into the Presence
//! Store for the live leaderboard, and drains whole minutes into the
//! Durable Ledger. Pending minutes are kept as sealed batches with
//! idempotency keys: a failed flush stays pending and is retried on the
//! next trigger, and the ledger deduplicates by key so a duplicate send
//! cannot double-count. Minutes are only lost if the process dies with
//! batches still unsent.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time;
use tracing;
use uuid::Uuid;

use studyhub_store::paths::MutationIntent;

use crate::events::SyncEvent;
use crate::presence;
use crate::session::SessionContext;

/// Whether the reconciler is counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountingState {
    /// No study session running.
    Idle,
    /// A study session is running; ticks accumulate.
    Accumulating,
}

/// One sealed batch of minutes awaiting ledger acceptance.
#[derive(Debug, Clone)]
struct FlushBatch {
    key: Uuid,
    minutes: u32,
}

#[derive(Debug)]
struct Inner {
    state: AccountingState,
    /// Minutes ticked since the last seal.
    open_minutes: u32,
    /// Sealed batches not yet accepted by the ledger.
    sealed: Vec<FlushBatch>,
}

/// Reconciles the local study-time counter with the mirror and the ledger.
#[derive(Debug)]
pub struct TimeAccountingReconciler {
    ctx: Arc<SessionContext>,
    inner: Mutex<Inner>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl TimeAccountingReconciler {
    /// Create an idle reconciler for the session.
    pub fn new(ctx: Arc<SessionContext>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            inner: Mutex::new(Inner {
                state: AccountingState::Idle,
                open_minutes: 0,
                sealed: Vec::new(),
            }),
            tick_task: Mutex::new(None),
        })
    }

    /// Start a study session.
    ///
    /// Seeds the live mirror from the ledger's current total so the
    /// leaderboard starts from a realistic baseline rather than zero, then
    /// starts the tick loop. Idempotent while already accumulating.
    pub async fn start_session(self: &Arc<Self>) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.state == AccountingState::Accumulating {
                return;
            }
            inner.state = AccountingState::Accumulating;
        }
        self.ctx.set_studying(true);

        let username = self.ctx.identity().username.clone();
        match self.ctx.ledger().study_stats(&username).await {
            Ok(stats) => self.ctx.set_mirror_seconds(stats.total_minutes * 60),
            Err(e) => {
                // The mirror is cosmetic; the ledger stays authoritative.
                tracing::warn!("mirror seed from ledger failed, starting at zero: {}", e);
                self.ctx.set_mirror_seconds(0);
            }
        }

        // Re-announce so the seeded mirror and the studying flag land in
        // the store together.
        presence::synchronizer::announce(&self.ctx).await;

        let reconciler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            reconciler.run_ticks().await;
        });
        let mut tick_task = self.tick_task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = tick_task.replace(handle) {
            old.abort();
        }
    }

    /// End the study session: stop ticking, flush whatever is pending, and
    /// clear the studying flag. Safe to call when already idle.
    pub async fn stop_session(&self) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.state = AccountingState::Idle;
        }
        {
            let mut tick_task = self.tick_task.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(handle) = tick_task.take() {
                handle.abort();
            }
        }
        self.ctx.set_studying(false);
        self.ctx
            .fire(
                MutationIntent::SetCommunityStudying {
                    conn: self.ctx.store().connection_id(),
                    studying: false,
                },
                "studying flag clear",
            )
            .await;
        self.flush().await;
    }

    /// Minutes ticked but not yet accepted by the ledger.
    pub fn unflushed_minutes(&self) -> u32 {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.open_minutes + inner.sealed.iter().map(|b| b.minutes).sum::<u32>()
    }

    /// One accounting tick: mirror the interval into the store and add one
    /// pending minute, flushing at the threshold.
    ///
    /// A tick landing while idle is ignored entirely; the mirror only moves
    /// while a session is accumulating.
    pub async fn record_tick(&self) {
        if self.ctx.has_left() {
            return;
        }
        let pending = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.state != AccountingState::Accumulating {
                return;
            }
            inner.open_minutes += 1;
            inner.open_minutes + inner.sealed.iter().map(|b| b.minutes).sum::<u32>()
        };

        let interval = self.ctx.config().accounting.tick_interval_seconds;
        let total = self.ctx.add_mirror_seconds(interval);
        self.ctx
            .fire(
                MutationIntent::MirrorStudySeconds {
                    room: self.ctx.room(),
                    uid: self.ctx.identity().uid,
                    delta: interval as i64,
                },
                "study mirror",
            )
            .await;
        self.ctx.emit(SyncEvent::StudyMirrorUpdated {
            accumulated_seconds: total,
        });

        if pending >= self.ctx.config().accounting.flush_threshold_minutes {
            self.flush().await;
        }
    }

    /// Drain pending minutes into the ledger.
    ///
    /// The open minutes are sealed under a fresh idempotency key *before*
    /// the network call; a tick firing during the round-trip lands in a new
    /// open batch and cannot be double-counted. Batches the ledger rejects
    /// stay sealed for the next trigger.
    pub async fn flush(&self) {
        let batches = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.open_minutes > 0 {
                let batch = FlushBatch {
                    key: Uuid::new_v4(),
                    minutes: inner.open_minutes,
                };
                inner.open_minutes = 0;
                inner.sealed.push(batch);
            }
            inner.sealed.clone()
        };

        let username = self.ctx.identity().username.clone();
        for batch in batches {
            match self
                .ctx
                .ledger()
                .update_study(&username, batch.minutes, batch.key)
                .await
            {
                Ok(()) => {
                    let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                    inner.sealed.retain(|b| b.key != batch.key);
                }
                Err(e) => {
                    tracing::warn!(
                        minutes = batch.minutes,
                        "flush rejected, batch stays pending: {}",
                        e
                    );
                    break;
                }
            }
        }
    }

    async fn run_ticks(self: Arc<Self>) {
        let period =
            std::time::Duration::from_secs(self.ctx.config().accounting.tick_interval_seconds);
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        // The first tick completes immediately; minutes start counting one
        // full interval after the session starts.
        interval.tick().await;

        let mut shutdown = self.ctx.shutdown_signal();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    if self.ctx.has_left() {
                        break;
                    }
                    self.record_tick().await;
                }
            }
        }
    }
}
