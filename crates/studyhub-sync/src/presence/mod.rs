//! Own-presence announcement and the community presence feed.

pub mod dedup;
pub mod synchronizer;

pub use synchronizer::{logout, spawn_announcer, spawn_community_watcher};
