// Error types for the session layer.

use livecode_common::types::{AccessLevel, Language, Permission};
use thiserror::Error;

/// Failures reported by the realtime store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid store key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("cannot write to the store root")]
    RootWrite,

    #[error("connection is closed")]
    Disconnected,

    #[error("disconnect hook rejected for {path}")]
    HookRejected { path: String },

    #[error("unexpected value at {path}: {message}")]
    Decode { path: String, message: String },
}

/// Sign-in failure reported by the identity provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Error signing in: {code} {message}")]
pub struct IdentityError {
    pub code: String,
    pub message: String,
}

impl IdentityError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// Failures surfaced by a buffer handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("{0} buffer is read-only for this user")]
    ReadOnly(Language),

    #[error("workspace is not resolved yet")]
    Unresolved,

    #[error("edit out of range: index {index} exceeds length {len}")]
    OutOfRange { index: u32, len: u32 },

    #[error("buffer codec error: {0}")]
    Codec(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Terminal failures of the join sequence and session-level actions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("This file is private.")]
    AccessRefused,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("permission denied: requires {required}, have {actual}")]
    PermissionDenied { required: Permission, actual: Permission },

    #[error("{0} cannot be used as a workspace default")]
    InvalidDefault(AccessLevel),

    #[error("session has not joined a workspace")]
    NotJoined,
}
