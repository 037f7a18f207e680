//! Time accounting: the ephemeral fast path and the durable slow path.

pub mod reconciler;

pub use reconciler::TimeAccountingReconciler;
