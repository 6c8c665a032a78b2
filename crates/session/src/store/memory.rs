// In-memory realtime store.
//
// One `MemoryStore` is the shared tree every client sees; each
// `MemoryConnection` is one client connection with its own set of armed
// disconnect hooks. Dropping a connection through `disconnect()` runs those
// hooks store-side, exactly like a tab closing or losing its network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::error::StoreError;
use crate::store::path::{validate_key, StorePath};
use crate::store::push_id::PushIdGenerator;
use crate::store::{RealtimeStore, ServerValue};

pub type ConnectionId = u64;

/// Shared in-memory tree. Cheap to clone; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    tree: RwLock<TreeState>,
    next_connection: AtomicU64,
    push_ids: PushIdGenerator,
}

#[derive(Debug, Default)]
struct TreeState {
    root: Map<String, Value>,
    hooks: HashMap<ConnectionId, Vec<StorePath>>,
    watchers: Vec<Watcher>,
}

#[derive(Debug)]
struct Watcher {
    path: StorePath,
    tx: watch::Sender<Option<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new client connection (one browser tab).
    pub fn connect(&self) -> MemoryConnection {
        let id = self.shared.next_connection.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(connection_id = id, "store connection opened");
        MemoryConnection { store: self.clone(), id, link: Arc::new(Link::default()) }
    }

    /// Read through the store without going through a connection.
    pub async fn read(&self, path: &StorePath) -> Option<Value> {
        self.shared.tree.read().await.read(path)
    }

    fn server_now() -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Default)]
struct Link {
    closed: AtomicBool,
    reject_hooks: AtomicBool,
}

/// A single client's connection to a [`MemoryStore`].
///
/// Clones share the connection: they are the same tab, not new ones.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    store: MemoryStore,
    id: ConnectionId,
    link: Arc<Link>,
}

impl MemoryConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn is_connected(&self) -> bool {
        !self.link.closed.load(Ordering::SeqCst)
    }

    /// Make subsequent hook registrations fail, as when the client is
    /// offline at the moment of joining.
    pub fn reject_disconnect_hooks(&self, reject: bool) {
        self.link.reject_hooks.store(reject, Ordering::SeqCst);
    }

    /// Paths this connection has armed for removal on disconnect.
    pub async fn armed_hooks(&self) -> Vec<StorePath> {
        let tree = self.store.shared.tree.read().await;
        tree.hooks.get(&self.id).cloned().unwrap_or_default()
    }

    /// Drop the connection and let the store run its disconnect hooks.
    /// Returns the number of hooks that fired; a second call is a no-op.
    pub async fn disconnect(&self) -> usize {
        if self.link.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let mut tree = self.store.shared.tree.write().await;
        let hooks = tree.hooks.remove(&self.id).unwrap_or_default();
        for path in &hooks {
            tree.delete(path);
        }
        tree.notify(&hooks);
        debug!(connection_id = self.id, hooks = hooks.len(), "store connection dropped");
        hooks.len()
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }
}

impl RealtimeStore for MemoryConnection {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.ensure_connected()?;
        path.validate()?;
        Ok(self.store.shared.tree.read().await.read(path))
    }

    async fn subscribe(
        &self,
        path: &StorePath,
    ) -> Result<watch::Receiver<Option<Value>>, StoreError> {
        self.ensure_connected()?;
        path.validate()?;
        let mut tree = self.store.shared.tree.write().await;
        let (tx, rx) = watch::channel(tree.read(path));
        tree.watchers.push(Watcher { path: path.clone(), tx });
        Ok(rx)
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.ensure_connected()?;
        validate_write(path, &value)?;
        let mut tree = self.store.shared.tree.write().await;
        tree.write(path, value, MemoryStore::server_now());
        tree.notify(std::slice::from_ref(path));
        debug!(path = %path, "store set");
        Ok(())
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.ensure_connected()?;
        let writes = fields
            .into_iter()
            .map(|(relative, value)| {
                let target = path.child(&relative);
                if target == *path {
                    return Err(StoreError::InvalidKey { key: relative, reason: "key is empty" });
                }
                validate_write(&target, &value)?;
                Ok((target, value))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let now = MemoryStore::server_now();
        let mut tree = self.store.shared.tree.write().await;
        for (target, value) in &writes {
            tree.write(target, value.clone(), now);
        }
        let changed = writes.into_iter().map(|(target, _)| target).collect::<Vec<_>>();
        tree.notify(&changed);
        debug!(path = %path, fields = changed.len(), "store update");
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        self.set(path, Value::Null).await
    }

    fn generate_key(&self) -> String {
        self.store.shared.push_ids.next_id(Utc::now().timestamp_millis())
    }

    async fn on_disconnect_remove(&self, path: &StorePath) -> Result<(), StoreError> {
        self.ensure_connected()?;
        path.validate()?;
        if self.link.reject_hooks.load(Ordering::SeqCst) {
            return Err(StoreError::HookRejected { path: path.to_string() });
        }
        let mut tree = self.store.shared.tree.write().await;
        let hooks = tree.hooks.entry(self.id).or_default();
        if !hooks.contains(path) {
            hooks.push(path.clone());
        }
        Ok(())
    }
}

impl TreeState {
    fn read(&self, path: &StorePath) -> Option<Value> {
        let mut segments = path.segments().iter();
        let Some(first) = segments.next() else {
            return (!self.root.is_empty()).then(|| Value::Object(self.root.clone()));
        };
        let mut node = self.root.get(first)?;
        for segment in segments {
            node = node.as_object()?.get(segment)?;
        }
        Some(node.clone())
    }

    fn write(&mut self, path: &StorePath, value: Value, now: i64) {
        let Some(value) = resolve(value, now) else {
            self.delete(path);
            return;
        };
        let Some((last, parents)) = path.segments().split_last() else {
            return;
        };
        let mut node = &mut self.root;
        for segment in parents {
            let child = node.entry(segment.clone()).or_insert_with(|| Value::Object(Map::new()));
            node = ensure_object(child);
        }
        node.insert(last.clone(), value);
    }

    fn delete(&mut self, path: &StorePath) {
        remove_at(&mut self.root, path.segments());
    }

    fn notify(&mut self, changed: &[StorePath]) {
        self.watchers.retain(|watcher| !watcher.tx.is_closed());
        for watcher in &self.watchers {
            if !changed.iter().any(|path| path.overlaps(&watcher.path)) {
                continue;
            }
            let current = self.read(&watcher.path);
            watcher.tx.send_if_modified(|slot| {
                if *slot == current {
                    return false;
                }
                *slot = current;
                true
            });
        }
    }
}

fn validate_write(path: &StorePath, value: &Value) -> Result<(), StoreError> {
    if path.is_root() {
        return Err(StoreError::RootWrite);
    }
    path.validate()?;
    validate_value(value)
}

fn validate_value(value: &Value) -> Result<(), StoreError> {
    if ServerValue::is_timestamp(value) {
        return Ok(());
    }
    match value {
        Value::Object(map) => map.iter().try_for_each(|(key, child)| {
            validate_key(key)?;
            validate_value(child)
        }),
        Value::Array(items) => items.iter().try_for_each(validate_value),
        _ => Ok(()),
    }
}

/// Resolve server-value sentinels and drop nulls and empty objects, so
/// that "no data" is always represented by absence.
fn resolve(value: Value, now: i64) -> Option<Value> {
    if ServerValue::is_timestamp(&value) {
        return Some(Value::from(now));
    }
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned = map
                .into_iter()
                .filter_map(|(key, child)| resolve(child, now).map(|child| (key, child)))
                .collect::<Map<String, Value>>();
            (!cleaned.is_empty()).then_some(Value::Object(cleaned))
        }
        Value::Array(items) => Some(Value::Array(
            items.into_iter().map(|item| resolve(item, now).unwrap_or(Value::Null)).collect(),
        )),
        other => Some(other),
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Remove the node at `segments`, pruning ancestors left empty.
/// Returns whether `map` itself ended up empty.
fn remove_at(map: &mut Map<String, Value>, segments: &[String]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return map.is_empty();
    };
    if rest.is_empty() {
        map.shift_remove(first);
    } else if let Some(Value::Object(child)) = map.get_mut(first) {
        if remove_at(child, rest) {
            map.shift_remove(first);
        }
    }
    map.is_empty()
}
