//! Shared primitive types used across StudyHub crates.

pub mod id;

pub use id::{ConnectionId, RoomId, UserId};
