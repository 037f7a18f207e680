//! Scheduled maintenance for the Presence Store.
//!
//! This crate provides:
//! - A sweep task that evicts room participants whose heartbeats went stale
//! - A reconciliation task that flips abandoned community records offline
//! - A cron scheduler that runs both on configured schedules
//!
//! The worker runs on its own store connection, so crashed or partitioned
//! clients get cleaned up without any client being responsible for it.

pub mod reconcile;
pub mod scheduler;
pub mod sweep;

pub use scheduler::CronScheduler;
