//! Events emitted by the synchronizers toward the UI layer.
//!
//! Every event carries a full recomputed view, never a delta: a consumer
//! that misses an event is healed by the next one.

use serde::{Deserialize, Serialize};

use studyhub_core::types::UserId;
use studyhub_entity::presence::CommunityPresenceRecord;
use studyhub_entity::room::Participant;
use studyhub_entity::timer::{RoomTimerState, TimerMode};

/// Events delivered to the session's event subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// The canonical community roster changed.
    RosterChanged {
        /// Deduplicated records: online users first, then by descending
        /// last-seen.
        roster: Vec<CommunityPresenceRecord>,
    },
    /// The room's participant set changed.
    ParticipantsChanged {
        /// Current participants, sorted by username.
        participants: Vec<Participant>,
    },
    /// The shared timer document changed.
    TimerChanged {
        /// The new shared state.
        state: RoomTimerState,
    },
    /// Local display tick with the derived countdown.
    TimerTick {
        /// Current phase.
        mode: TimerMode,
        /// Derived remaining seconds.
        remaining_seconds: u32,
        /// Whether the countdown is running.
        is_active: bool,
    },
    /// The live accumulated study-seconds mirror advanced.
    StudyMirrorUpdated {
        /// The mirrored total, in seconds.
        accumulated_seconds: u64,
    },
    /// The unread badge set changed.
    UnreadChanged {
        /// Partners with unread conversations, newest first.
        partners: Vec<UserId>,
    },
}
