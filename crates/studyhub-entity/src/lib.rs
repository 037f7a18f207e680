//! # studyhub-entity
//!
//! Domain entity models for StudyHub. Every struct in this crate represents
//! a document (or document fragment) in the Presence Store, or a value
//! object shared between the synchronizers. All entities derive `Debug`,
//! `Clone`, `Serialize`, and `Deserialize`; wire forms are camelCase to
//! match the store's JSON documents.

pub mod chat;
pub mod presence;
pub mod room;
pub mod timer;

pub use chat::PrivateChatSummary;
pub use presence::{CommunityPresenceRecord, PresenceRecord, PresenceStatus};
pub use room::Participant;
pub use timer::{RoomTimerState, TimerMode};
