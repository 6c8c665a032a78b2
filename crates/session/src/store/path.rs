// Hierarchical store paths.

use std::fmt;

use crate::error::StoreError;

/// Characters the store refuses inside a key.
const FORBIDDEN_KEY_CHARS: [char; 6] = ['.', '#', '$', '[', ']', '/'];
const MAX_KEY_BYTES: usize = 768;

/// Location of a node in the store tree, e.g. `/-abc/users/u1/connections`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated path, validating every key.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let segments = raw.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect::<Vec<_>>();
        for segment in &segments {
            validate_key(segment)?;
        }
        Ok(Self { segments })
    }

    /// Descend to a child. `relative` may span several levels
    /// (`"connections/first"`); keys are validated when the path is written.
    pub fn child(&self, relative: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(relative.split('/').filter(|s| !s.is_empty()).map(str::to_string));
        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self { segments: self.segments[..self.segments.len() - 1].to_vec() })
    }

    /// Last key of the path; `None` for the root.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn starts_with(&self, prefix: &StorePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// True when a write at one path can change the value seen at the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        self.segments.iter().try_for_each(|segment| validate_key(segment))
    }
}

pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey { key: key.into(), reason: "key is empty" });
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(StoreError::InvalidKey { key: key.into(), reason: "key is too long" });
    }
    if key.chars().any(|c| FORBIDDEN_KEY_CHARS.contains(&c) || c.is_control()) {
        return Err(StoreError::InvalidKey {
            key: key.into(),
            reason: "key contains a forbidden character",
        });
    }
    Ok(())
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
