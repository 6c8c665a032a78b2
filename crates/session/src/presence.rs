// Collaborator records and live presence.
//
// A user is online while their record holds at least one connection
// marker. Markers are only ever removed by the owning tab's disconnect hook.

use livecode_common::color::color_from_user_id;
use livecode_common::types::{OnlineUser, Permission, UserEntry};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::lifecycle::{ConnectionLifecycleManager, ConnectionMarker};
use crate::refs::{UserRef, WorkspaceRef, CONNECTIONS_KEY, FIRST_CONNECTION_KEY};
use crate::store::{RealtimeStore, ServerValue};

pub struct PresenceTracker<'a, S> {
    store: &'a S,
    lifecycle: ConnectionLifecycleManager<'a, S>,
}

impl<'a, S: RealtimeStore> PresenceTracker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store, lifecycle: ConnectionLifecycleManager::new(store) }
    }

    /// Create the user's record: name, derived color, `OWNER` when granted,
    /// and the armed `first` connection marker. Fields already present on the
    /// record (such as markers of a concurrent tab) are left in place.
    pub async fn join_first_time(
        &self,
        user: &UserRef,
        permission: Permission,
        name: &str,
    ) -> Result<ConnectionMarker, StoreError> {
        let marker = self.lifecycle.prepare_first(user).await;

        let mut fields = Map::new();
        fields.insert("name".into(), Value::from(name));
        fields.insert("color".into(), Value::from(color_from_user_id(user.id())));
        if permission == Permission::Owner {
            fields.insert("permission".into(), Value::from(Permission::Owner.as_str()));
        }
        fields.insert(format!("{CONNECTIONS_KEY}/{FIRST_CONNECTION_KEY}"), ServerValue::timestamp());
        self.store.update(user.path(), fields).await?;

        info!(user_id = user.id(), name, permission = %permission, "joined workspace for the first time");
        Ok(marker)
    }

    /// Reconcile the stored name and add a fresh connection marker.
    pub async fn join_returning(
        &self,
        user: &UserRef,
        stored: &UserEntry,
        name: &str,
    ) -> Result<ConnectionMarker, StoreError> {
        if stored.name.as_deref() != Some(name) {
            self.store.set(&user.path().child("name"), Value::from(name)).await?;
            debug!(user_id = user.id(), name, "display name updated");
        }
        let marker = self.lifecycle.open_pushed(user).await?;
        info!(
            user_id = user.id(),
            connections = stored.connection_count() + 1,
            "rejoined workspace"
        );
        Ok(marker)
    }

    /// One read of the users collection.
    pub async fn online_users(&self, workspace: &WorkspaceRef) -> Result<Vec<OnlineUser>, StoreError> {
        let users = self.store.get(&workspace.users_path()).await?;
        Ok(parse_users(users.as_ref()))
    }

    /// Live view of the users collection.
    pub async fn watch_online_users(
        &self,
        workspace: &WorkspaceRef,
    ) -> Result<OnlineUsersWatch, StoreError> {
        let rx = self.store.subscribe(&workspace.users_path()).await?;
        Ok(OnlineUsersWatch { rx })
    }
}

/// Turn a users-collection snapshot into list rows, in store child order.
/// Entries that are malformed or not yet named are skipped.
pub fn parse_users(users: Option<&Value>) -> Vec<OnlineUser> {
    let Some(users) = users.and_then(Value::as_object) else {
        return Vec::new();
    };
    users
        .iter()
        .filter_map(|(id, value)| {
            let entry = UserEntry::from_json(value)?;
            OnlineUser::from_entry(id, &entry)
        })
        .collect()
}

/// Subscription to the collaborator list.
#[derive(Debug)]
pub struct OnlineUsersWatch {
    rx: watch::Receiver<Option<Value>>,
}

impl OnlineUsersWatch {
    pub fn current(&self) -> Vec<OnlineUser> {
        parse_users(self.rx.borrow().as_ref())
    }

    /// Wait for the next change. `None` once the store side is gone.
    pub async fn changed(&mut self) -> Option<Vec<OnlineUser>> {
        self.rx.changed().await.ok()?;
        Some(parse_users(self.rx.borrow_and_update().as_ref()))
    }
}
