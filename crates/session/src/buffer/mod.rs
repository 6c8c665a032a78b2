// Per-language buffer coordination.
//
// The session core does not merge text. It hands each language's buffer
// service a binding: where the buffer lives in the store, whether this user
// may edit it, and the caret namespace to publish under.

pub mod ydoc;
pub mod yrs_service;

use std::future::Future;

use livecode_common::types::{Language, Permission};
use serde::Serialize;

use crate::error::BufferError;
use crate::refs::WorkspaceRef;
use crate::store::StorePath;

pub use yrs_service::{YrsBuffer, YrsBufferService};

/// Identity a user's caret is published under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaretNamespace {
    pub user_id: String,
    pub color: String,
}

/// Everything a buffer service needs to mount one language's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferBinding {
    pub language: Language,
    pub reference: StorePath,
    pub editable: bool,
    pub caret: CaretNamespace,
    pub file_name: &'static str,
    pub editor_mode: &'static str,
    /// Seeded into a buffer that has never been written.
    pub default_code: &'static str,
}

/// Synchronized-text-buffer service.
pub trait BufferService: Send + Sync + 'static {
    type Handle: BufferHandle;

    fn mount(
        &self,
        binding: BufferBinding,
    ) -> impl Future<Output = Result<Self::Handle, BufferError>> + Send;
}

/// A mounted buffer. Edits and caret updates fail with
/// [`BufferError::ReadOnly`] when the binding is not editable.
///
/// Indexes and lengths count characters, not bytes.
pub trait BufferHandle: Send + Sync {
    fn binding(&self) -> &BufferBinding;

    fn text(&self) -> String;

    fn is_editable(&self) -> bool {
        self.binding().editable
    }

    fn insert(&self, index: u32, content: &str)
        -> impl Future<Output = Result<(), BufferError>> + Send;

    fn delete(&self, index: u32, len: u32) -> impl Future<Output = Result<(), BufferError>> + Send;

    /// Pull in remote changes. Returns how many were applied.
    fn sync(&self) -> impl Future<Output = Result<usize, BufferError>> + Send;

    fn set_caret(&self, anchor: u32, head: u32)
        -> impl Future<Output = Result<(), BufferError>> + Send;
}

/// Binds one language's buffer to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSyncCoordinator {
    language: Language,
    workspace: Option<WorkspaceRef>,
    permission: Option<Permission>,
    caret: CaretNamespace,
}

impl BufferSyncCoordinator {
    pub fn new(
        language: Language,
        workspace: Option<WorkspaceRef>,
        permission: Option<Permission>,
        caret: CaretNamespace,
    ) -> Self {
        Self { language, workspace, permission, caret }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Editing needs a resolved workspace and a write-capable permission.
    pub fn is_editable(&self) -> bool {
        self.workspace.is_some() && self.permission.is_some_and(Permission::can_edit)
    }

    /// Store sub-reference owned by the buffer service.
    pub fn content_ref(&self) -> Option<StorePath> {
        self.workspace.as_ref().map(|workspace| workspace.buffer(self.language))
    }

    pub fn caret(&self) -> &CaretNamespace {
        &self.caret
    }

    pub fn binding(&self) -> Result<BufferBinding, BufferError> {
        let reference = self.content_ref().ok_or(BufferError::Unresolved)?;
        Ok(BufferBinding {
            language: self.language,
            reference,
            editable: self.is_editable(),
            caret: self.caret.clone(),
            file_name: self.language.file_name(),
            editor_mode: self.language.editor_mode(),
            default_code: self.language.default_code(),
        })
    }

    pub async fn mount<B: BufferService>(&self, service: &B) -> Result<B::Handle, BufferError> {
        service.mount(self.binding()?).await
    }
}

/// One coordinator per configured language plus the active tab.
#[derive(Debug, Clone)]
pub struct BufferSet {
    coordinators: Vec<BufferSyncCoordinator>,
    active: Language,
}

impl BufferSet {
    /// Duplicate languages are collapsed. An `active` language that is not
    /// configured falls back to the first configured one.
    pub fn new(
        workspace: Option<&WorkspaceRef>,
        permission: Option<Permission>,
        caret: CaretNamespace,
        languages: &[Language],
        active: Language,
    ) -> Self {
        let mut coordinators: Vec<BufferSyncCoordinator> = Vec::with_capacity(languages.len());
        for &language in languages {
            if coordinators.iter().any(|c| c.language == language) {
                continue;
            }
            coordinators.push(BufferSyncCoordinator::new(
                language,
                workspace.cloned(),
                permission,
                caret.clone(),
            ));
        }
        let active = if coordinators.iter().any(|c| c.language == active) {
            active
        } else {
            coordinators.first().map_or(active, |c| c.language)
        };
        Self { coordinators, active }
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.coordinators.iter().map(BufferSyncCoordinator::language)
    }

    pub fn coordinator(&self, language: Language) -> Option<&BufferSyncCoordinator> {
        self.coordinators.iter().find(|c| c.language == language)
    }

    pub fn active(&self) -> Language {
        self.active
    }

    /// Switch tabs. Returns `false` for a language without a buffer.
    pub fn set_active(&mut self, language: Language) -> bool {
        if self.coordinator(language).is_none() {
            return false;
        }
        self.active = language;
        true
    }

    pub fn bindings(&self) -> Result<Vec<BufferBinding>, BufferError> {
        self.coordinators.iter().map(BufferSyncCoordinator::binding).collect()
    }

    pub async fn mount_all<B: BufferService>(
        &self,
        service: &B,
    ) -> Result<Vec<B::Handle>, BufferError> {
        let mut handles = Vec::with_capacity(self.coordinators.len());
        for coordinator in &self.coordinators {
            handles.push(coordinator.mount(service).await?);
        }
        Ok(handles)
    }
}
