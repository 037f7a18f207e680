//! Presence Store trait for the external real-time key/value service.
//!
//! An implementation represents *one client connection* to the store:
//! last-will registration and connection state are scoped to that
//! connection, while writes fan out to every subscriber on any connection.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, watch};

use crate::result::AppResult;
use crate::types::ConnectionId;

/// A single mutation against a store path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WriteOp {
    /// Replace the value at the path.
    Set(Value),
    /// Merge the given fields into the object at the path.
    Update(Map<String, Value>),
    /// Delete the path and its subtree.
    Remove,
    /// Atomically add the delta to the integer at the path.
    Increment(i64),
}

/// A resolved write: a storage path plus the operation to apply there.
///
/// Callers never build paths inline; they go through the mutation-intent
/// resolution in `studyhub-store` so path construction lives in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreWrite {
    /// Slash-separated storage key path.
    pub path: String,
    /// The operation to apply.
    pub op: WriteOp,
}

/// A change notification delivered to subscribers.
///
/// Carries a full snapshot of the subscribed subtree after the change,
/// `None` if the subtree no longer exists. Subscribers recompute their
/// view wholesale from the snapshot; there is no incremental patching.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    /// The subscribed path this event is for.
    pub path: String,
    /// Snapshot of the subtree at the path, if present.
    pub value: Option<Value>,
}

/// Connection state of this client's link to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The connection is live.
    Connected,
    /// The connection is down; last-will mutations have fired server-side.
    Disconnected,
}

/// Trait for Presence Store backends.
///
/// The production backend speaks the real-time store's wire protocol; the
/// in-memory backend in `studyhub-store` implements the same contract for
/// tests and single-process runs.
#[async_trait]
pub trait PresenceStore: Send + Sync + fmt::Debug + 'static {
    /// This connection's identifier. Keys the per-connection community
    /// presence record.
    fn connection_id(&self) -> ConnectionId;

    /// Replace the value at a path.
    async fn set(&self, path: &str, value: Value) -> AppResult<()>;

    /// Merge fields into the object at a path.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> AppResult<()>;

    /// Delete a path and its subtree.
    async fn remove(&self, path: &str) -> AppResult<()>;

    /// Atomically add `delta` to the integer at a path. Returns the new value.
    async fn increment(&self, path: &str, delta: i64) -> AppResult<i64>;

    /// One-time read of the subtree at a path.
    async fn get(&self, path: &str) -> AppResult<Option<Value>>;

    /// Subscribe to changes under a path.
    ///
    /// The receiver gets a [`StoreEvent`] with a fresh subtree snapshot on
    /// every change, including one initial event for the current state.
    async fn subscribe(&self, path: &str) -> AppResult<broadcast::Receiver<StoreEvent>>;

    /// Register the last-will mutations for this connection.
    ///
    /// The given writes are executed server-side if the connection drops.
    /// Each call replaces the previously registered set, so re-announcing
    /// after a reconnect does not stack duplicate wills.
    async fn on_disconnect(&self, writes: Vec<StoreWrite>) -> AppResult<()>;

    /// Watch this connection's state. Synchronizers re-announce presence on
    /// every transition back to [`ConnectionState::Connected`].
    fn connection_state(&self) -> watch::Receiver<ConnectionState>;

    /// The store's server-assigned current time.
    ///
    /// Shared documents only ever carry server timestamps; clients never mix
    /// local wall time into them.
    fn server_now(&self) -> DateTime<Utc>;

    /// Apply a resolved write. Default dispatches to the primitive ops.
    async fn apply(&self, write: StoreWrite) -> AppResult<()> {
        match write.op {
            WriteOp::Set(value) => self.set(&write.path, value).await,
            WriteOp::Update(fields) => self.update(&write.path, fields).await,
            WriteOp::Remove => self.remove(&write.path).await,
            WriteOp::Increment(delta) => {
                self.increment(&write.path, delta).await?;
                Ok(())
            }
        }
    }
}
