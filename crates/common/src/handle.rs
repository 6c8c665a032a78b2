// Public workspace handles and their mapping to store keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Leading character of every store-generated push key.
pub const STORE_KEY_PREFIX: char = '-';

/// Longest handle accepted from a URL.
const MAX_HANDLE_CHARS: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error("handle is empty")]
    Empty,

    #[error("handle exceeds maximum length of {MAX_HANDLE_CHARS} characters")]
    TooLong,

    #[error("handle contains a character that is not URL-safe: {0:?}")]
    InvalidChar(char),

    #[error("store key does not start with '{STORE_KEY_PREFIX}': {0}")]
    MissingPrefix(String),
}

/// Short public identifier of a workspace, as it appears in the URL.
///
/// Handles are restricted to `[A-Za-z0-9_-]`, which keeps them URL-safe and
/// valid as store keys once the prefix is added back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceHandle(String);

impl WorkspaceHandle {
    pub fn parse(raw: &str) -> Result<Self, HandleError> {
        if raw.is_empty() {
            return Err(HandleError::Empty);
        }
        if raw.chars().count() > MAX_HANDLE_CHARS {
            return Err(HandleError::TooLong);
        }
        if let Some(bad) = raw.chars().find(|c| !is_url_safe(*c)) {
            return Err(HandleError::InvalidChar(bad));
        }
        Ok(Self(raw.to_string()))
    }

    /// Derive the handle from a store-generated key by stripping its prefix.
    pub fn from_store_key(key: &str) -> Result<Self, HandleError> {
        let rest =
            key.strip_prefix(STORE_KEY_PREFIX).ok_or_else(|| HandleError::MissingPrefix(key.into()))?;
        Self::parse(rest)
    }

    /// Key of the workspace root record in the store.
    pub fn store_key(&self) -> String {
        format!("{STORE_KEY_PREFIX}{}", self.0)
    }

    /// Path of the workspace page relative to the application root.
    pub fn url_path(&self) -> String {
        format!("/{}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_url_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl fmt::Display for WorkspaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WorkspaceHandle {
    type Error = HandleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WorkspaceHandle> for String {
    fn from(handle: WorkspaceHandle) -> Self {
        handle.0
    }
}
