// Workspace identity resolution from the entry URL.
//
// `/<handle>` addresses an existing workspace; `/` mints a new one and
// rewrites the URL in place so a reload lands on the same workspace.

use std::sync::{Arc, Mutex};

use livecode_common::handle::{HandleError, WorkspaceHandle};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::refs::WorkspaceRef;
use crate::store::RealtimeStore;

/// The page URL as seen by the session.
pub trait Location: Send + Sync + 'static {
    /// Path component of the current URL, possibly with query/fragment.
    fn path(&self) -> String;

    /// Rewrite the URL in place: no reload, no new history entry.
    fn replace_path(&self, path: &str);

    /// Navigate away (full page load).
    fn assign(&self, path: &str);
}

/// Outcome of resolving the entry URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWorkspace {
    pub workspace: WorkspaceRef,
    /// True when no handle was supplied and a new workspace key was minted.
    pub minted: bool,
}

/// What the entry path says about the workspace.
#[derive(Debug, PartialEq, Eq)]
pub enum EntryPath {
    /// Application root (or any path that does not carry a handle).
    Root,
    Handle(WorkspaceHandle),
    /// A single segment that is not a usable handle.
    Invalid { raw: String, error: HandleError },
}

/// Parse the entry path. Only a path with exactly one non-empty segment
/// carries a handle; query strings and fragments are ignored.
pub fn parse_entry_path(path: &str) -> EntryPath {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments = path.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>();
    match segments.as_slice() {
        [single] => match WorkspaceHandle::parse(single) {
            Ok(handle) => EntryPath::Handle(handle),
            Err(error) => EntryPath::Invalid { raw: (*single).to_string(), error },
        },
        _ => EntryPath::Root,
    }
}

pub struct IdentityResolver<'a, S, L> {
    store: &'a S,
    location: &'a L,
}

impl<'a, S: RealtimeStore, L: Location> IdentityResolver<'a, S, L> {
    pub fn new(store: &'a S, location: &'a L) -> Self {
        Self { store, location }
    }

    /// Resolve the workspace addressed by the current URL, minting a new one
    /// when none is addressed. Never creates store records.
    pub fn resolve(&self) -> Result<ResolvedWorkspace, StoreError> {
        match parse_entry_path(&self.location.path()) {
            EntryPath::Handle(handle) => {
                info!(handle = %handle, "resolved workspace from url");
                Ok(ResolvedWorkspace { workspace: WorkspaceRef::new(handle), minted: false })
            }
            EntryPath::Invalid { raw, error } => {
                warn!(segment = %raw, error = %error, "ignoring unusable workspace handle");
                self.mint()
            }
            EntryPath::Root => self.mint(),
        }
    }

    fn mint(&self) -> Result<ResolvedWorkspace, StoreError> {
        let key = self.store.generate_key();
        let handle = WorkspaceHandle::from_store_key(&key).map_err(|_| StoreError::InvalidKey {
            key: key.clone(),
            reason: "generated key is not a valid workspace handle",
        })?;
        self.location.replace_path(&handle.url_path());
        info!(handle = %handle, "minted new workspace");
        Ok(ResolvedWorkspace { workspace: WorkspaceRef::new(handle), minted: true })
    }
}

/// In-memory [`Location`] that records URL rewrites and navigations.
#[derive(Debug, Clone)]
pub struct MemoryLocation {
    state: Arc<Mutex<LocationState>>,
}

#[derive(Debug)]
struct LocationState {
    path: String,
    history: Vec<String>,
    navigations: Vec<String>,
}

impl MemoryLocation {
    pub fn new(initial_path: impl Into<String>) -> Self {
        let path = initial_path.into();
        Self {
            state: Arc::new(Mutex::new(LocationState {
                history: vec![path.clone()],
                path,
                navigations: Vec::new(),
            })),
        }
    }

    /// Number of back-navigable history entries.
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// Full-page navigations issued through [`Location::assign`].
    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocationState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Location for MemoryLocation {
    fn path(&self) -> String {
        self.lock().path.clone()
    }

    fn replace_path(&self, path: &str) {
        let mut state = self.lock();
        state.path = path.to_string();
        if let Some(current) = state.history.last_mut() {
            *current = path.to_string();
        }
    }

    fn assign(&self, path: &str) {
        let mut state = self.lock();
        state.path = path.to_string();
        state.history.push(path.to_string());
        state.navigations.push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn root_paths_carry_no_handle() {
        assert_eq!(parse_entry_path("/"), EntryPath::Root);
        assert_eq!(parse_entry_path(""), EntryPath::Root);
        assert_eq!(parse_entry_path("/?ref=share"), EntryPath::Root);
        assert_eq!(parse_entry_path("/a/b"), EntryPath::Root);
    }

    #[test]
    fn single_segment_is_the_handle() {
        let expected = EntryPath::Handle(WorkspaceHandle::parse("NqX3k").unwrap());
        assert_eq!(parse_entry_path("/NqX3k"), expected);
        assert_eq!(parse_entry_path("/NqX3k/"), expected);
        assert_eq!(parse_entry_path("/NqX3k?tab=java#L3"), expected);
    }

    #[test]
    fn unsafe_segment_is_reported_invalid() {
        assert!(matches!(parse_entry_path("/a.b"), EntryPath::Invalid { .. }));
    }

    #[test]
    fn existing_handle_resolves_without_touching_url() {
        let conn = MemoryStore::new().connect();
        let location = MemoryLocation::new("/NqX3k");
        let resolved = IdentityResolver::new(&conn, &location).resolve().unwrap();
        assert!(!resolved.minted);
        assert_eq!(resolved.workspace.handle().as_str(), "NqX3k");
        assert_eq!(resolved.workspace.path().to_string(), "/-NqX3k");
        assert_eq!(location.path(), "/NqX3k");
    }

    #[test]
    fn missing_handle_mints_and_replaces_url_in_place() {
        let conn = MemoryStore::new().connect();
        let location = MemoryLocation::new("/");
        let resolved = IdentityResolver::new(&conn, &location).resolve().unwrap();

        assert!(resolved.minted);
        assert_eq!(location.path(), resolved.workspace.handle().url_path());
        assert_eq!(location.history_len(), 1);
        assert!(location.navigations().is_empty());
    }

    #[test]
    fn minted_handle_resolves_to_same_workspace_on_reload() {
        let conn = MemoryStore::new().connect();
        let location = MemoryLocation::new("/");
        let minted = IdentityResolver::new(&conn, &location).resolve().unwrap();

        let reloaded = MemoryLocation::new(location.path());
        let again = IdentityResolver::new(&conn, &reloaded).resolve().unwrap();
        assert!(!again.minted);
        assert_eq!(again.workspace, minted.workspace);
    }

    #[test]
    fn invalid_handle_falls_back_to_minting() {
        let conn = MemoryStore::new().connect();
        let location = MemoryLocation::new("/not.valid");
        let resolved = IdentityResolver::new(&conn, &location).resolve().unwrap();
        assert!(resolved.minted);
        assert_ne!(location.path(), "/not.valid");
    }

    #[test]
    fn assign_adds_history_entry() {
        let location = MemoryLocation::new("/abc");
        location.assign("/");
        assert_eq!(location.path(), "/");
        assert_eq!(location.history_len(), 2);
        assert_eq!(location.navigations(), vec!["/".to_string()]);
    }
}
