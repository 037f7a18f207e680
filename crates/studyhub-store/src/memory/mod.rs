//! In-memory Presence Store backend.

pub mod store;

pub use store::{MemoryConnection, MemoryPresenceStore};
