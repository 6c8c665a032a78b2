// Workspace access decisions.
//
// The gate reads the workspace default and the joining user's record once
// each, initializes the default on a brand-new workspace, and decides the
// effective permission. It never writes the user's own record.

use livecode_common::types::{AccessLevel, Permission, UserEntry};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{SessionError, StoreError};
use crate::refs::WorkspaceRef;
use crate::store::RealtimeStore;

/// Default written for future joiners when a workspace is first entered.
pub const INITIAL_DEFAULT: AccessLevel = AccessLevel::ReadWrite;

/// Effective permission for a user. `None` means entry is refused.
pub fn effective_permission(stored: Option<Permission>, default: AccessLevel) -> Option<Permission> {
    stored.or_else(|| default.effective())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Admitted(Permission),
    Refused,
}

/// Everything the join sequence learned while deciding access.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub outcome: GateOutcome,
    /// Default shown to the UI: the stored one, or the initial default when
    /// this join created it.
    pub default_permission: AccessLevel,
    /// The user's record as read before joining.
    pub existing: Option<UserEntry>,
    /// True when no default was stored and this join initialized it.
    pub created_workspace: bool,
}

impl GateDecision {
    pub fn effective(&self) -> Option<Permission> {
        match self.outcome {
            GateOutcome::Admitted(permission) => Some(permission),
            GateOutcome::Refused => None,
        }
    }

    /// A user without a stored name has never joined this workspace.
    pub fn is_first_join(&self) -> bool {
        self.existing.as_ref().map_or(true, UserEntry::is_first_join)
    }
}

pub struct PermissionGate<'a, S> {
    store: &'a S,
}

impl<'a, S: RealtimeStore> PermissionGate<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn resolve_effective_permission(
        &self,
        workspace: &WorkspaceRef,
        user_id: &str,
    ) -> Result<GateDecision, StoreError> {
        let default_path = workspace.default_permission_path();
        let stored_default = self.store.get(&default_path).await?;

        let (default_permission, created_workspace) = match stored_default {
            Some(value) => (parse_default(&value, workspace), false),
            None => {
                self.store.set(&default_path, Value::from(INITIAL_DEFAULT.as_str())).await?;
                info!(handle = %workspace.handle(), "initialized workspace default permission");
                (INITIAL_DEFAULT, true)
            }
        };

        let user = workspace.user(user_id);
        let existing = match self.store.get(user.path()).await? {
            Some(value) => {
                let entry = UserEntry::from_json(&value);
                if entry.is_none() {
                    warn!(user_id, "ignoring malformed user record");
                }
                entry
            }
            None => None,
        };

        let outcome = if created_workspace {
            GateOutcome::Admitted(Permission::Owner)
        } else {
            let stored = existing.as_ref().and_then(|entry| entry.permission);
            match effective_permission(stored, default_permission) {
                Some(permission) => GateOutcome::Admitted(permission),
                None => GateOutcome::Refused,
            }
        };
        debug!(
            handle = %workspace.handle(),
            user_id,
            default = %default_permission,
            ?outcome,
            "permission resolved"
        );

        Ok(GateDecision { outcome, default_permission, existing, created_workspace })
    }

    /// Owner settings action: change the default applied to users without a
    /// stored permission.
    pub async fn set_default_permission(
        &self,
        workspace: &WorkspaceRef,
        actor: Permission,
        level: AccessLevel,
    ) -> Result<(), SessionError> {
        if !actor.allows(Permission::Owner) {
            return Err(SessionError::PermissionDenied { required: Permission::Owner, actual: actor });
        }
        if !level.is_valid_default() {
            return Err(SessionError::InvalidDefault(level));
        }
        self.store.set(&workspace.default_permission_path(), Value::from(level.as_str())).await?;
        info!(handle = %workspace.handle(), level = %level, "default permission changed");
        Ok(())
    }
}

fn parse_default(value: &Value, workspace: &WorkspaceRef) -> AccessLevel {
    match value.as_str().and_then(|raw| raw.parse::<AccessLevel>().ok()) {
        Some(level) if level.is_valid_default() => level,
        _ => {
            warn!(handle = %workspace.handle(), %value, "unrecognized default permission");
            INITIAL_DEFAULT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use livecode_common::handle::WorkspaceHandle;
    use serde_json::json;

    fn workspace() -> WorkspaceRef {
        WorkspaceRef::new(WorkspaceHandle::parse("H1").unwrap())
    }

    #[test]
    fn effective_prefers_stored_permission() {
        assert_eq!(
            effective_permission(Some(Permission::Owner), AccessLevel::Private),
            Some(Permission::Owner)
        );
        assert_eq!(
            effective_permission(None, AccessLevel::Read),
            Some(Permission::Read)
        );
        assert_eq!(effective_permission(None, AccessLevel::Private), None);
    }

    #[tokio::test]
    async fn brand_new_workspace_admits_owner_and_writes_default() {
        let conn = MemoryStore::new().connect();
        let ws = workspace();
        let decision =
            PermissionGate::new(&conn).resolve_effective_permission(&ws, "u1").await.unwrap();

        assert_eq!(decision.outcome, GateOutcome::Admitted(Permission::Owner));
        assert!(decision.created_workspace);
        assert!(decision.is_first_join());
        assert_eq!(decision.default_permission, AccessLevel::ReadWrite);
        assert_eq!(
            conn.get(&ws.default_permission_path()).await.unwrap(),
            Some(json!("READ_WRITE"))
        );
    }

    #[tokio::test]
    async fn later_joiner_gets_workspace_default() {
        let conn = MemoryStore::new().connect();
        let ws = workspace();
        conn.set(&ws.default_permission_path(), json!("READ")).await.unwrap();

        let decision =
            PermissionGate::new(&conn).resolve_effective_permission(&ws, "u2").await.unwrap();
        assert_eq!(decision.outcome, GateOutcome::Admitted(Permission::Read));
        assert!(!decision.created_workspace);
    }

    #[tokio::test]
    async fn private_workspace_refuses_users_without_permission() {
        let conn = MemoryStore::new().connect();
        let ws = workspace();
        conn.set(&ws.default_permission_path(), json!("PRIVATE")).await.unwrap();
        conn.set(&ws.user("u2").path().child("name"), json!("Anonymous Yak")).await.unwrap();

        let gate = PermissionGate::new(&conn);
        assert_eq!(
            gate.resolve_effective_permission(&ws, "u2").await.unwrap().outcome,
            GateOutcome::Refused
        );
        assert_eq!(
            gate.resolve_effective_permission(&ws, "u3").await.unwrap().outcome,
            GateOutcome::Refused
        );
    }

    #[tokio::test]
    async fn private_workspace_admits_owner() {
        let conn = MemoryStore::new().connect();
        let ws = workspace();
        conn.set(&ws.default_permission_path(), json!("PRIVATE")).await.unwrap();
        conn.set(ws.user("u1").path(), json!({"name": "Anonymous Owl", "permission": "OWNER"}))
            .await
            .unwrap();

        let decision =
            PermissionGate::new(&conn).resolve_effective_permission(&ws, "u1").await.unwrap();
        assert_eq!(decision.outcome, GateOutcome::Admitted(Permission::Owner));
        assert!(!decision.is_first_join());
    }

    #[tokio::test]
    async fn unrecognized_default_falls_back_to_read_write() {
        let conn = MemoryStore::new().connect();
        let ws = workspace();
        conn.set(&ws.default_permission_path(), json!("EVERYONE")).await.unwrap();

        let decision =
            PermissionGate::new(&conn).resolve_effective_permission(&ws, "u1").await.unwrap();
        assert_eq!(decision.outcome, GateOutcome::Admitted(Permission::ReadWrite));
        assert_eq!(decision.default_permission, AccessLevel::ReadWrite);
    }

    #[tokio::test]
    async fn only_owner_may_change_default() {
        let conn = MemoryStore::new().connect();
        let ws = workspace();
        let gate = PermissionGate::new(&conn);

        let denied = gate
            .set_default_permission(&ws, Permission::ReadWrite, AccessLevel::Private)
            .await
            .unwrap_err();
        assert_eq!(
            denied,
            SessionError::PermissionDenied {
                required: Permission::Owner,
                actual: Permission::ReadWrite
            }
        );

        gate.set_default_permission(&ws, Permission::Owner, AccessLevel::Private).await.unwrap();
        assert_eq!(conn.get(&ws.default_permission_path()).await.unwrap(), Some(json!("PRIVATE")));
    }

    #[tokio::test]
    async fn owner_is_not_a_valid_default() {
        let conn = MemoryStore::new().connect();
        let ws = workspace();
        conn.set(&ws.default_permission_path(), json!("READ")).await.unwrap();

        let error = PermissionGate::new(&conn)
            .set_default_permission(&ws, Permission::Owner, AccessLevel::Owner)
            .await
            .unwrap_err();
        assert_eq!(error, SessionError::InvalidDefault(AccessLevel::Owner));
        assert_eq!(conn.get(&ws.default_permission_path()).await.unwrap(), Some(json!("READ")));
    }

    #[tokio::test]
    async fn stored_owner_default_is_read_as_read_write() {
        let conn = MemoryStore::new().connect();
        let ws = workspace();
        conn.set(&ws.default_permission_path(), json!("OWNER")).await.unwrap();

        let decision =
            PermissionGate::new(&conn).resolve_effective_permission(&ws, "u2").await.unwrap();
        assert_eq!(decision.outcome, GateOutcome::Admitted(Permission::ReadWrite));
        assert_eq!(decision.default_permission, AccessLevel::ReadWrite);
    }
}
