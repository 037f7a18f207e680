//! Chat state: read watermarks, unread badges, and the ledger history
//! read-through.

pub mod history;
pub mod unread;
pub mod watermarks;

pub use unread::UnreadTracker;
pub use watermarks::WatermarkStore;
