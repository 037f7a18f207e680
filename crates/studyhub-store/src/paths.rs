//! Storage key paths and mutation intents.
//!
//! Every store key used anywhere in StudyHub is built here. Call sites
//! express *what* they want as a [`MutationIntent`] and let [`resolve`]
//! produce the path and operation, so path construction cannot silently
//! diverge between call sites.
//!
//! [`resolve`]: MutationIntent::resolve

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use studyhub_core::AppResult;
use studyhub_core::traits::store::{StoreWrite, WriteOp};
use studyhub_core::types::{ConnectionId, RoomId, UserId};
use studyhub_entity::presence::{CommunityPresenceRecord, PresenceRecord, PresenceStatus};
use studyhub_entity::room::Participant;
use studyhub_entity::timer::RoomTimerState;

/// Root of all room documents.
pub fn rooms() -> String {
    "rooms".to_string()
}

/// One room's document.
pub fn room(room: RoomId) -> String {
    format!("rooms/{room}")
}

/// A user's room-scoped presence record.
pub fn room_presence(room: RoomId, uid: UserId) -> String {
    format!("rooms/{room}/presence/{uid}")
}

/// The live accumulated-seconds mirror inside a room presence record.
pub fn room_presence_seconds(room: RoomId, uid: UserId) -> String {
    format!("rooms/{room}/presence/{uid}/accumulatedSeconds")
}

/// A room's participant set (one child key per uid).
pub fn participants(room: RoomId) -> String {
    format!("rooms/{room}/participants")
}

/// One participant entry.
pub fn participant(room: RoomId, uid: UserId) -> String {
    format!("rooms/{room}/participants/{uid}")
}

/// A user's typing-indicator flag in a room.
pub fn typing(room: RoomId, uid: UserId) -> String {
    format!("rooms/{room}/typing/{uid}")
}

/// A room's heartbeat map (one timestamp per present uid).
pub fn heartbeats(room: RoomId) -> String {
    format!("rooms/{room}/heartbeats")
}

/// One heartbeat entry.
pub fn heartbeat(room: RoomId, uid: UserId) -> String {
    format!("rooms/{room}/heartbeats/{uid}")
}

/// A room's shared timer document.
pub fn timer(room: RoomId) -> String {
    format!("rooms/{room}/timer")
}

/// The global community presence feed (one record per connection).
pub fn community() -> String {
    "community".to_string()
}

/// One connection's community presence record.
pub fn community_presence(conn: ConnectionId) -> String {
    format!("community/{conn}")
}

/// A user's private-chat inbox (one summary per conversation partner).
pub fn inbox(uid: UserId) -> String {
    format!("inbox/{uid}")
}

/// One inbox summary entry.
pub fn inbox_summary(uid: UserId, partner: UserId) -> String {
    format!("inbox/{uid}/{partner}")
}

/// A mutation expressed by what it means, not where it lands.
#[derive(Debug, Clone)]
pub enum MutationIntent {
    /// Write the caller's room presence record.
    AnnounceRoomPresence {
        /// The room.
        room: RoomId,
        /// The caller.
        uid: UserId,
        /// The record to write.
        record: PresenceRecord,
    },
    /// Remove the caller's room presence record.
    RemoveRoomPresence {
        /// The room.
        room: RoomId,
        /// The caller.
        uid: UserId,
    },
    /// Atomically add seconds to the live study-time mirror.
    MirrorStudySeconds {
        /// The room.
        room: RoomId,
        /// The caller.
        uid: UserId,
        /// Seconds to add.
        delta: i64,
    },
    /// Write the caller's community presence record for this connection.
    AnnounceCommunity {
        /// The connection the record belongs to.
        conn: ConnectionId,
        /// The record to write.
        record: CommunityPresenceRecord,
    },
    /// Flip a connection's community record offline (logout or last-will).
    SetCommunityOffline {
        /// The connection the record belongs to.
        conn: ConnectionId,
        /// Server-assigned disconnect time.
        last_seen: DateTime<Utc>,
    },
    /// Flip a connection's community `isStudying` flag.
    SetCommunityStudying {
        /// The connection the record belongs to.
        conn: ConnectionId,
        /// Whether a study session is running.
        studying: bool,
    },
    /// Add a participant to a room (idempotent set-union by uid).
    JoinRoom {
        /// The room.
        room: RoomId,
        /// The joining participant.
        participant: Participant,
    },
    /// Remove a participant from a room (idempotent set-difference by uid).
    LeaveRoom {
        /// The room.
        room: RoomId,
        /// The leaving user.
        uid: UserId,
    },
    /// Set the caller's typing indicator in a room.
    SetTyping {
        /// The room.
        room: RoomId,
        /// The typing user.
        uid: UserId,
    },
    /// Clear the caller's typing indicator in a room.
    ClearTyping {
        /// The room.
        room: RoomId,
        /// The user.
        uid: UserId,
    },
    /// Write the caller's room heartbeat timestamp.
    WriteHeartbeat {
        /// The room.
        room: RoomId,
        /// The user.
        uid: UserId,
        /// Server-assigned heartbeat time.
        at: DateTime<Utc>,
    },
    /// Remove a user's room heartbeat entry.
    RemoveHeartbeat {
        /// The room.
        room: RoomId,
        /// The user.
        uid: UserId,
    },
    /// Write a room's shared timer document.
    WriteTimer {
        /// The room.
        room: RoomId,
        /// The full timer state to write.
        state: RoomTimerState,
    },
    /// Write a conversation summary into a user's inbox.
    WriteInboxSummary {
        /// Whose inbox.
        owner: UserId,
        /// The conversation partner the summary is keyed by.
        partner: UserId,
        /// The summary document.
        summary: studyhub_entity::chat::PrivateChatSummary,
    },
}

impl MutationIntent {
    /// Resolve the intent into a concrete path and operation.
    pub fn resolve(&self) -> AppResult<StoreWrite> {
        let write = match self {
            Self::AnnounceRoomPresence { room, uid, record } => StoreWrite {
                path: room_presence(*room, *uid),
                op: WriteOp::Set(serde_json::to_value(record)?),
            },
            Self::RemoveRoomPresence { room, uid } => StoreWrite {
                path: room_presence(*room, *uid),
                op: WriteOp::Remove,
            },
            Self::MirrorStudySeconds { room, uid, delta } => StoreWrite {
                path: room_presence_seconds(*room, *uid),
                op: WriteOp::Increment(*delta),
            },
            Self::AnnounceCommunity { conn, record } => StoreWrite {
                path: community_presence(*conn),
                op: WriteOp::Set(serde_json::to_value(record)?),
            },
            Self::SetCommunityOffline { conn, last_seen } => {
                let mut fields = Map::new();
                fields.insert(
                    "status".to_string(),
                    serde_json::to_value(PresenceStatus::Offline)?,
                );
                fields.insert("lastSeen".to_string(), serde_json::to_value(last_seen)?);
                fields.insert("isStudying".to_string(), Value::Bool(false));
                StoreWrite {
                    path: community_presence(*conn),
                    op: WriteOp::Update(fields),
                }
            }
            Self::SetCommunityStudying { conn, studying } => {
                let mut fields = Map::new();
                fields.insert("isStudying".to_string(), Value::Bool(*studying));
                StoreWrite {
                    path: community_presence(*conn),
                    op: WriteOp::Update(fields),
                }
            }
            Self::JoinRoom { room, participant } => StoreWrite {
                path: self::participant(*room, participant.uid),
                op: WriteOp::Set(serde_json::to_value(participant)?),
            },
            Self::LeaveRoom { room, uid } => StoreWrite {
                path: self::participant(*room, *uid),
                op: WriteOp::Remove,
            },
            Self::SetTyping { room, uid } => StoreWrite {
                path: typing(*room, *uid),
                op: WriteOp::Set(Value::Bool(true)),
            },
            Self::ClearTyping { room, uid } => StoreWrite {
                path: typing(*room, *uid),
                op: WriteOp::Remove,
            },
            Self::WriteHeartbeat { room, uid, at } => StoreWrite {
                path: heartbeat(*room, *uid),
                op: WriteOp::Set(serde_json::to_value(at)?),
            },
            Self::RemoveHeartbeat { room, uid } => StoreWrite {
                path: heartbeat(*room, *uid),
                op: WriteOp::Remove,
            },
            Self::WriteTimer { room, state } => StoreWrite {
                path: timer(*room),
                op: WriteOp::Set(serde_json::to_value(state)?),
            },
            Self::WriteInboxSummary {
                owner,
                partner,
                summary,
            } => StoreWrite {
                path: inbox_summary(*owner, *partner),
                op: WriteOp::Set(serde_json::to_value(summary)?),
            },
        };
        Ok(write)
    }
}
