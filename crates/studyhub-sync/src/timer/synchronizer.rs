//! Shared timer synchronization.
//!
//! The timer document holds control state only (phase, baseline, start
//! instant); the live countdown is derived locally from the server clock on
//! every display tick, so N clients stay in agreement without exchanging
//! per-second messages. Completion transitions are written as full derived
//! documents: when two clients hit zero together, both write the same
//! state and last-writer-wins converges on it.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::time;
use tracing;

use studyhub_core::{AppError, AppResult};
use studyhub_entity::timer::{RoomTimerState, TimerMode};
use studyhub_store::paths;
use studyhub_store::paths::MutationIntent;

use crate::events::SyncEvent;
use crate::session::SessionContext;

/// The timer state that follows a countdown reaching zero.
///
/// A completed study phase bumps the cycle counter and leads into a short
/// break, or a long break on every `sessions_per_cycle`-th completion. A
/// completed long break resets the cycle. The result is always inactive;
/// someone has to press start again.
pub fn completion_transition(state: &RoomTimerState, sessions_per_cycle: u32) -> RoomTimerState {
    let mut next = state.clone();
    next.is_active = false;
    next.start_time = None;

    match state.mode {
        TimerMode::Study => {
            let completed = state.completed_study_sessions + 1;
            next.completed_study_sessions = completed;
            next.mode = if sessions_per_cycle > 0 && completed % sessions_per_cycle == 0 {
                TimerMode::LongBreak
            } else {
                TimerMode::ShortBreak
            };
        }
        TimerMode::ShortBreak => {
            next.mode = TimerMode::Study;
        }
        TimerMode::LongBreak => {
            next.mode = TimerMode::Study;
            next.completed_study_sessions = 0;
        }
    }
    next.time = next.duration_for(next.mode);
    next
}

/// Synchronizes one room's shared timer document.
#[derive(Debug)]
pub struct TimerSynchronizer {
    ctx: Arc<SessionContext>,
}

impl TimerSynchronizer {
    /// Create a synchronizer for the session's room.
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// Create the shared timer document if the room does not have one yet.
    ///
    /// Racing joiners both observe the document missing and both write the
    /// same fresh configuration-derived state, so the race is harmless.
    pub async fn ensure_document(&self) -> AppResult<()> {
        let existing = self.ctx.store().get(&paths::timer(self.ctx.room())).await?;
        if existing.is_none() {
            let state = RoomTimerState::from_config(&self.ctx.config().timer);
            self.write(state).await?;
        }
        Ok(())
    }

    /// Read and parse the current shared state.
    pub async fn current(&self) -> AppResult<RoomTimerState> {
        let value = self
            .ctx
            .store()
            .get(&paths::timer(self.ctx.room()))
            .await?
            .ok_or_else(|| AppError::not_found("room has no timer document"))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Start the countdown from the current baseline.
    ///
    /// The server-assigned start instant goes into the document; every
    /// client derives the same remaining value from it.
    pub async fn start(&self) -> AppResult<()> {
        let mut state = self.current().await?;
        if state.is_active {
            return Ok(());
        }
        state.is_active = true;
        state.start_time = Some(self.ctx.store().server_now());
        self.write(state).await
    }

    /// Pause the countdown, folding the elapsed time into the baseline.
    pub async fn pause(&self) -> AppResult<()> {
        let mut state = self.current().await?;
        if !state.is_active {
            return Ok(());
        }
        state.time = state.remaining_at(self.ctx.store().server_now());
        state.is_active = false;
        state.start_time = None;
        self.write(state).await
    }

    /// Switch the shared timer to another phase, stopped at its full length.
    pub async fn switch_mode(&self, mode: TimerMode) -> AppResult<()> {
        let mut state = self.current().await?;
        state.mode = mode;
        state.is_active = false;
        state.start_time = None;
        state.time = state.duration_for(mode);
        self.write(state).await
    }

    /// Replace the per-phase durations, stopping the timer at the current
    /// phase's new full length.
    pub async fn set_durations(&self, study: u32, short_break: u32, long_break: u32) -> AppResult<()> {
        let mut state = self.current().await?;
        state.study_duration = study;
        state.short_break_duration = short_break;
        state.long_break_duration = long_break;
        state.is_active = false;
        state.start_time = None;
        state.time = state.duration_for(state.mode);
        self.write(state).await
    }

    async fn write(&self, state: RoomTimerState) -> AppResult<()> {
        let write = MutationIntent::WriteTimer {
            room: self.ctx.room(),
            state,
        }
        .resolve()?;
        self.ctx.store().apply(write).await
    }

    /// Spawn the display loop: follow document changes, tick the derived
    /// countdown locally, and write the completion transition when an
    /// active countdown reaches zero.
    pub fn spawn_display_loop(&self) {
        let ctx = Arc::clone(&self.ctx);
        let handle = tokio::spawn(async move {
            run_display_loop(ctx).await;
        });
        self.ctx.track(handle);
    }
}

async fn run_display_loop(ctx: Arc<SessionContext>) {
    let mut rx = match ctx.store().subscribe(&paths::timer(ctx.room())).await {
        Ok(rx) => rx,
        Err(e) => {
            tracing::warn!("timer subscription failed: {}", e);
            return;
        }
    };
    let mut shutdown = ctx.shutdown_signal();

    let period = std::time::Duration::from_millis(ctx.config().timer.display_tick_ms);
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    let mut state: Option<RoomTimerState> = None;
    // The countdown we already wrote a completion for; keyed by its start
    // instant so the transition fires once per countdown even though zero
    // keeps deriving until the new document arrives.
    let mut completed_start = None;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = rx.recv() => match event {
                Ok(event) => {
                    if ctx.has_left() {
                        break;
                    }
                    match event.value {
                        Some(value) => match serde_json::from_value::<RoomTimerState>(value) {
                            Ok(new_state) => {
                                ctx.emit(SyncEvent::TimerChanged {
                                    state: new_state.clone(),
                                });
                                state = Some(new_state);
                            }
                            Err(e) => {
                                tracing::warn!("unparseable timer document ignored: {}", e);
                            }
                        },
                        None => state = None,
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                if ctx.has_left() {
                    break;
                }
                let Some(current) = state.as_ref() else {
                    continue;
                };
                let remaining = current.remaining_at(ctx.store().server_now());
                ctx.emit(SyncEvent::TimerTick {
                    mode: current.mode,
                    remaining_seconds: remaining,
                    is_active: current.is_active,
                });

                if current.is_active
                    && remaining == 0
                    && completed_start != Some(current.start_time)
                {
                    completed_start = Some(current.start_time);
                    let next = completion_transition(
                        current,
                        ctx.config().timer.sessions_per_cycle,
                    );
                    ctx.fire(
                        MutationIntent::WriteTimer {
                            room: ctx.room(),
                            state: next,
                        },
                        "timer completion",
                    )
                    .await;
                }
            }
        }
    }
}
