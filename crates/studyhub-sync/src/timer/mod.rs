//! Shared room timer synchronization.

pub mod synchronizer;

pub use synchronizer::{TimerSynchronizer, completion_transition};
