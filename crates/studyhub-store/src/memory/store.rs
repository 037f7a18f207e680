//! In-memory implementation of the Presence Store contract.
//!
//! One [`MemoryPresenceStore`] plays the server; each simulated client gets
//! its own [`MemoryConnection`] with per-connection last-will registration
//! and connection state. Used by tests and the local node; a production
//! deployment swaps in a backend speaking the real store's protocol behind
//! the same trait.

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, watch};
use tracing;

use studyhub_core::traits::Clock;
use studyhub_core::traits::store::{
    ConnectionState, PresenceStore, StoreEvent, StoreWrite, WriteOp,
};
use studyhub_core::types::ConnectionId;
use studyhub_core::{AppError, AppResult};

/// Buffer size for subscription channels. A lagging subscriber only misses
/// intermediate snapshots; the next event carries the full current state.
const SUBSCRIPTION_BUFFER: usize = 64;

/// The shared in-memory store (the "server" side).
#[derive(Debug)]
pub struct MemoryPresenceStore {
    /// The whole document tree.
    root: RwLock<Value>,
    /// Subscribed path → fan-out channel.
    subscriptions: DashMap<String, broadcast::Sender<StoreEvent>>,
    /// Server clock.
    clock: Arc<dyn Clock>,
}

impl MemoryPresenceStore {
    /// Create a new empty store using the given server clock.
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            root: RwLock::new(Value::Object(Map::new())),
            subscriptions: DashMap::new(),
            clock,
        })
    }

    /// Open a new client connection to this store.
    pub fn connect(self: &Arc<Self>) -> Arc<MemoryConnection> {
        let (state_tx, _) = watch::channel(ConnectionState::Connected);
        Arc::new(MemoryConnection {
            id: ConnectionId::new(),
            store: Arc::clone(self),
            state_tx,
            last_will: Mutex::new(Vec::new()),
        })
    }

    /// The server clock's current time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Read the subtree at a path.
    pub fn read(&self, path: &str) -> Option<Value> {
        let root = self.root.read().unwrap_or_else(|e| e.into_inner());
        get_at(&root, path).cloned()
    }

    /// Apply a write server-side and notify subscribers.
    ///
    /// Also used to execute last-will mutations, which run on the server
    /// after the owning connection is already gone.
    pub fn apply_write(&self, write: &StoreWrite) -> AppResult<i64> {
        let result = {
            let mut root = self.root.write().unwrap_or_else(|e| e.into_inner());
            match &write.op {
                WriteOp::Set(value) => {
                    set_at(&mut root, &write.path, value.clone());
                    0
                }
                WriteOp::Update(fields) => {
                    let target = force_object(ensure_at(&mut root, &write.path));
                    for (key, value) in fields {
                        target.insert(key.clone(), value.clone());
                    }
                    0
                }
                WriteOp::Remove => {
                    remove_at(&mut root, &write.path);
                    0
                }
                WriteOp::Increment(delta) => {
                    let target = ensure_at(&mut root, &write.path);
                    let current = target.as_i64().unwrap_or(0);
                    let next = current + delta;
                    *target = Value::from(next);
                    next
                }
            }
        };
        self.notify(&write.path);
        Ok(result)
    }

    /// Send fresh snapshots to every subscription related to the mutated
    /// path (ancestor or descendant).
    fn notify(&self, mutated: &str) {
        for entry in self.subscriptions.iter() {
            let subscribed = entry.key();
            if !paths_related(subscribed, mutated) {
                continue;
            }
            let event = StoreEvent {
                path: subscribed.clone(),
                value: self.read(subscribed),
            };
            // No receivers is fine; the channel keeps working for later ones.
            let _ = entry.value().send(event);
        }
    }

    fn sender_for(&self, path: &str) -> broadcast::Sender<StoreEvent> {
        self.subscriptions
            .entry(path.to_string())
            .or_insert_with(|| broadcast::channel(SUBSCRIPTION_BUFFER).0)
            .clone()
    }
}

/// One simulated client connection.
#[derive(Debug)]
pub struct MemoryConnection {
    /// This connection's identifier (keys the community presence record).
    id: ConnectionId,
    /// The shared server.
    store: Arc<MemoryPresenceStore>,
    /// Connection state fan-out.
    state_tx: watch::Sender<ConnectionState>,
    /// Writes to execute server-side if this connection drops.
    last_will: Mutex<Vec<StoreWrite>>,
}

impl MemoryConnection {
    /// This connection's identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The shared server behind this connection.
    pub fn store(&self) -> &Arc<MemoryPresenceStore> {
        &self.store
    }

    /// Drop the connection: execute registered last-will mutations
    /// server-side, clear them, and flip the state to disconnected.
    pub fn simulate_disconnect(&self) {
        let wills = {
            let mut last_will = self.last_will.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *last_will)
        };
        for write in wills {
            if let Err(e) = self.store.apply_write(&write) {
                tracing::warn!("last-will write to '{}' failed: {}", write.path, e);
            }
        }
        // send_replace: the transition must stick even with no subscriber.
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }

    /// Bring the connection back up. Subscribed synchronizers re-announce
    /// on observing the transition.
    pub fn reconnect(&self) {
        self.state_tx.send_replace(ConnectionState::Connected);
    }

    fn ensure_connected(&self) -> AppResult<()> {
        if *self.state_tx.borrow() == ConnectionState::Disconnected {
            return Err(AppError::store("connection is down"));
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceStore for MemoryConnection {
    fn connection_id(&self) -> ConnectionId {
        self.id
    }

    async fn set(&self, path: &str, value: Value) -> AppResult<()> {
        self.ensure_connected()?;
        self.store.apply_write(&StoreWrite {
            path: path.to_string(),
            op: WriteOp::Set(value),
        })?;
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> AppResult<()> {
        self.ensure_connected()?;
        self.store.apply_write(&StoreWrite {
            path: path.to_string(),
            op: WriteOp::Update(fields),
        })?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        self.ensure_connected()?;
        self.store.apply_write(&StoreWrite {
            path: path.to_string(),
            op: WriteOp::Remove,
        })?;
        Ok(())
    }

    async fn increment(&self, path: &str, delta: i64) -> AppResult<i64> {
        self.ensure_connected()?;
        self.store.apply_write(&StoreWrite {
            path: path.to_string(),
            op: WriteOp::Increment(delta),
        })
    }

    async fn get(&self, path: &str) -> AppResult<Option<Value>> {
        self.ensure_connected()?;
        Ok(self.store.read(path))
    }

    async fn subscribe(&self, path: &str) -> AppResult<broadcast::Receiver<StoreEvent>> {
        self.ensure_connected()?;
        let sender = self.store.sender_for(path);
        let receiver = sender.subscribe();
        // Initial snapshot so subscribers start from the current state.
        let _ = sender.send(StoreEvent {
            path: path.to_string(),
            value: self.store.read(path),
        });
        Ok(receiver)
    }

    async fn on_disconnect(&self, writes: Vec<StoreWrite>) -> AppResult<()> {
        self.ensure_connected()?;
        let mut last_will = self.last_will.lock().unwrap_or_else(|e| e.into_inner());
        *last_will = writes;
        Ok(())
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn server_now(&self) -> DateTime<Utc> {
        self.store.now()
    }
}

/// Whether one path is an ancestor of the other (or they are equal).
fn paths_related(a: &str, b: &str) -> bool {
    is_prefix(a, b) || is_prefix(b, a)
}

/// Segment-boundary prefix check: `rooms/1` is a prefix of `rooms/1/timer`
/// but not of `rooms/10`.
fn is_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

fn get_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('/') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Navigate to a path, creating intermediate objects, and return the slot.
fn ensure_at<'a>(root: &'a mut Value, path: &str) -> &'a mut Value {
    let mut current = root;
    for segment in path.split('/') {
        let map = force_object(current);
        current = map
            .entry(segment.to_string())
            .or_insert(Value::Object(Map::new()));
    }
    current
}

fn set_at(root: &mut Value, path: &str, value: Value) {
    *ensure_at(root, path) = value;
}

fn remove_at(root: &mut Value, path: &str) {
    let Some((parent_path, last)) = path.rsplit_once('/') else {
        if let Some(map) = root.as_object_mut() {
            map.remove(path);
        }
        return;
    };
    if let Some(parent) = get_at_mut(root, parent_path)
        && let Some(map) = parent.as_object_mut()
    {
        map.remove(last);
    }
}

fn get_at_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path.split('/') {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

/// Coerce a slot into an object, replacing any scalar already there.
fn force_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("slot was just coerced to an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyhub_core::traits::SystemClock;

    fn test_store() -> Arc<MemoryPresenceStore> {
        MemoryPresenceStore::new(Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = test_store();
        let conn = store.connect();

        conn.set("rooms/a/timer", serde_json::json!({"time": 1500}))
            .await
            .expect("set");

        let value = conn.get("rooms/a/timer").await.expect("get");
        assert_eq!(value, Some(serde_json::json!({"time": 1500})));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = test_store();
        let conn = store.connect();

        conn.set("community/c1", serde_json::json!({"status": "online", "isStudying": true}))
            .await
            .expect("set");

        let mut fields = Map::new();
        fields.insert("status".to_string(), Value::from("offline"));
        conn.update("community/c1", fields).await.expect("update");

        let value = conn.get("community/c1").await.expect("get");
        assert_eq!(
            value,
            Some(serde_json::json!({"status": "offline", "isStudying": true}))
        );
    }

    #[tokio::test]
    async fn test_increment_is_additive() {
        let store = test_store();
        let conn = store.connect();

        assert_eq!(conn.increment("counters/x", 60).await.expect("incr"), 60);
        assert_eq!(conn.increment("counters/x", 60).await.expect("incr"), 120);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_snapshots() {
        let store = test_store();
        let conn = store.connect();

        let mut rx = conn.subscribe("rooms/a").await.expect("subscribe");
        let initial = rx.recv().await.expect("initial event");
        assert_eq!(initial.value, None);

        conn.set("rooms/a/timer", serde_json::json!({"time": 300}))
            .await
            .expect("set");

        let event = rx.recv().await.expect("change event");
        let value = event.value.expect("subtree exists");
        assert_eq!(value["timer"]["time"], 300);
    }

    #[tokio::test]
    async fn test_last_will_fires_on_disconnect() {
        let store = test_store();
        let conn = store.connect();

        conn.set("community/c1", serde_json::json!({"status": "online"}))
            .await
            .expect("set");
        conn.on_disconnect(vec![StoreWrite {
            path: "community/c1".to_string(),
            op: WriteOp::Remove,
        }])
        .await
        .expect("register last will");

        conn.simulate_disconnect();

        assert_eq!(store.read("community/c1"), None);
        assert!(conn.get("community/c1").await.is_err());
    }

    #[tokio::test]
    async fn test_reconnect_restores_writes() {
        let store = test_store();
        let conn = store.connect();

        conn.simulate_disconnect();
        assert!(conn.set("x", Value::from(1)).await.is_err());

        conn.reconnect();
        conn.set("x", Value::from(1)).await.expect("set after reconnect");
        assert_eq!(store.read("x"), Some(Value::from(1)));
    }

    #[test]
    fn test_prefix_respects_segment_boundaries() {
        assert!(is_prefix("rooms/1", "rooms/1/timer"));
        assert!(is_prefix("rooms/1", "rooms/1"));
        assert!(!is_prefix("rooms/1", "rooms/10"));
    }
}
