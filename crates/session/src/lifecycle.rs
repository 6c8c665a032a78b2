// Connection markers and their store-side disconnect cleanup.
//
// Every marker gets exactly one "remove on disconnect" registration, made
// when the marker is created: the path is allocated, the hook is armed,
// then the marker is written.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::refs::{UserRef, FIRST_CONNECTION_KEY};
use crate::store::{RealtimeStore, ServerValue, StorePath};

/// One live connection of a user to a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionMarker {
    #[serde(serialize_with = "serialize_path")]
    pub path: StorePath,
    pub key: String,
    /// Whether the disconnect hook was accepted. An unarmed marker lingers
    /// after the tab is gone.
    pub armed: bool,
}

fn serialize_path<S: serde::Serializer>(path: &StorePath, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(path)
}

pub struct ConnectionLifecycleManager<'a, S> {
    store: &'a S,
}

impl<'a, S: RealtimeStore> ConnectionLifecycleManager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Arm removal of `path` when this connection drops. Failure is logged
    /// and reported as `false`; the caller proceeds either way.
    pub async fn arm(&self, path: &StorePath) -> bool {
        match self.store.on_disconnect_remove(path).await {
            Ok(()) => {
                debug!(path = %path, "disconnect hook armed");
                true
            }
            Err(err) => {
                warn!(path = %path, error = %err, "failed to arm disconnect hook");
                false
            }
        }
    }

    /// Allocate and arm the creator's `first` marker. The caller writes its
    /// value together with the rest of the first-join record.
    pub async fn prepare_first(&self, user: &UserRef) -> ConnectionMarker {
        let path = user.connection(FIRST_CONNECTION_KEY);
        let armed = self.arm(&path).await;
        ConnectionMarker { path, key: FIRST_CONNECTION_KEY.to_string(), armed }
    }

    /// Allocate, arm and write a fresh push-keyed marker.
    pub async fn open_pushed(&self, user: &UserRef) -> Result<ConnectionMarker, StoreError> {
        let key = self.store.generate_key();
        let path = user.connection(&key);
        let armed = self.arm(&path).await;
        self.store.set(&path, ServerValue::timestamp()).await?;
        debug!(user_id = user.id(), key = %key, armed, "connection marker written");
        Ok(ConnectionMarker { path, key, armed })
    }
}
