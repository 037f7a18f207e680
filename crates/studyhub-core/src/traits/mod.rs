//! Core traits defined in `studyhub-core` and implemented by other crates.

pub mod clock;
pub mod ledger;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::LedgerApi;
pub use store::PresenceStore;
