// Typed references into the workspace tree.

use livecode_common::handle::WorkspaceHandle;
use livecode_common::types::Language;

use crate::store::StorePath;

pub const SETTINGS_KEY: &str = "settings";
pub const DEFAULT_PERMISSION_KEY: &str = "defaultPermission";
pub const USERS_KEY: &str = "users";
pub const CONNECTIONS_KEY: &str = "connections";
/// Marker key of the creator's initial connection.
pub const FIRST_CONNECTION_KEY: &str = "first";

/// Durable reference to a workspace root record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceRef {
    handle: WorkspaceHandle,
    path: StorePath,
}

impl WorkspaceRef {
    pub fn new(handle: WorkspaceHandle) -> Self {
        let path = StorePath::root().child(&handle.store_key());
        Self { handle, path }
    }

    pub fn handle(&self) -> &WorkspaceHandle {
        &self.handle
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn default_permission_path(&self) -> StorePath {
        self.path.child(SETTINGS_KEY).child(DEFAULT_PERMISSION_KEY)
    }

    pub fn users_path(&self) -> StorePath {
        self.path.child(USERS_KEY)
    }

    pub fn user(&self, user_id: &str) -> UserRef {
        UserRef { id: user_id.to_string(), path: self.users_path().child(user_id) }
    }

    /// Sub-reference of one language's buffer channel.
    pub fn buffer(&self, language: Language) -> StorePath {
        self.path.child(language.channel_key())
    }
}

/// Reference to one collaborator's `users/<id>` record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserRef {
    id: String,
    path: StorePath,
}

impl UserRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn connections_path(&self) -> StorePath {
        self.path.child(CONNECTIONS_KEY)
    }

    pub fn connection(&self, key: &str) -> StorePath {
        self.connections_path().child(key)
    }
}
