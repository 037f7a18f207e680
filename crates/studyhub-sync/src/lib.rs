//! # studyhub-sync
//!
//! The synchronization engine: keeps N concurrently-connected clients'
//! local views of presence, room membership, the shared session timer, and
//! accrued study time consistent over the Presence Store, and reconciles
//! the ephemeral fast path with the Durable Ledger.
//!
//! One [`session::RoomSession`] per joined room owns the whole lifecycle:
//! create on join, tear down on leave. All cross-client structures are
//! commutative or idempotent under concurrent mutation; nothing here
//! depends on cross-client write ordering.

pub mod accounting;
pub mod chat;
pub mod events;
pub mod presence;
pub mod room;
pub mod session;
pub mod timer;

pub use events::SyncEvent;
pub use session::{RoomSession, SessionContext, SessionIdentity};
