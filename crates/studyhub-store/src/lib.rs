//! # studyhub-store
//!
//! The Presence Store seam: storage key paths, the tagged mutation-intent
//! union that resolves to them, and an in-memory backend implementing the
//! full store contract for tests and single-process runs.

pub mod memory;
pub mod paths;

pub use memory::{MemoryConnection, MemoryPresenceStore};
pub use paths::MutationIntent;
