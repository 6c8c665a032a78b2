// Realtime replicated store abstraction.
//
// The session core never talks to a concrete database. It consumes the
// `RealtimeStore` trait, which mirrors the primitives of a hierarchical
// realtime key/value store: point reads, continuous subscriptions, field
// writes, push keys, and store-side "remove on disconnect" hooks.

pub mod memory;
pub mod path;
pub mod push_id;

use std::future::Future;

use serde_json::{json, Map, Value};
use tokio::sync::watch;

use crate::error::StoreError;

pub use memory::{MemoryConnection, MemoryStore};
pub use path::StorePath;

/// Key of the server-value sentinel object.
const SERVER_VALUE_KEY: &str = ".sv";

/// Placeholders resolved by the store at write time.
pub struct ServerValue;

impl ServerValue {
    /// Sentinel replaced by the store's clock (UTC milliseconds) on write.
    pub fn timestamp() -> Value {
        json!({ SERVER_VALUE_KEY: "timestamp" })
    }

    pub fn is_timestamp(value: &Value) -> bool {
        value
            .as_object()
            .is_some_and(|obj| obj.len() == 1 && obj.get(SERVER_VALUE_KEY) == Some(&json!("timestamp")))
    }
}

/// One client's connection to the realtime store.
///
/// Each implementor represents a single live connection (a browser tab).
/// Disconnect hooks registered through it fire when that connection drops,
/// whether or not any client code runs at that moment.
pub trait RealtimeStore: Send + Sync + 'static {
    /// Point read. `None` when nothing is stored at `path`.
    fn get(
        &self,
        path: &StorePath,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Continuous read. The receiver holds the current value and is notified
    /// after every write that changes it.
    fn subscribe(
        &self,
        path: &StorePath,
    ) -> impl Future<Output = Result<watch::Receiver<Option<Value>>, StoreError>> + Send;

    /// Replace the value at `path`. Writing `null` removes it.
    fn set(
        &self,
        path: &StorePath,
        value: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Write several children of `path` at once. Keys may be relative
    /// multi-level paths (`"connections/first"`); siblings not named are
    /// left untouched.
    fn update(
        &self,
        path: &StorePath,
        fields: Map<String, Value>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove(&self, path: &StorePath) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Generate a unique, chronologically ordered child key locally.
    fn generate_key(&self) -> String;

    /// Arm a store-side instruction removing `path` when this connection
    /// drops.
    fn on_disconnect_remove(
        &self,
        path: &StorePath,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
