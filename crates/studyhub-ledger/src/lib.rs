//! # studyhub-ledger
//!
//! Clients for the Durable Ledger: the `reqwest`-based HTTP client used
//! against the real API, and an in-memory implementation used by tests and
//! single-process runs. Both implement [`studyhub_core::traits::LedgerApi`].

pub mod client;
pub mod memory;

pub use client::LedgerClient;
pub use memory::MemoryLedger;
