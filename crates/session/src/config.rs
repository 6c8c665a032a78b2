// Client configuration.
//
// Config file: `~/.livecode/config.toml`
// Environment overrides: `LIVECODE_APP_ROOT_URL`, `LIVECODE_DISPLAY_NAME`,
// `LIVECODE_LOG_FILTER`.

use livecode_common::handle::WorkspaceHandle;
use livecode_common::types::Language;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_APP_ROOT_URL: &str = "http://localhost:3000";

/// Root directory for livecode client state: `~/.livecode/`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".livecode"))
}

/// Path to the config file: `~/.livecode/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Root URL the share link is built from.
    pub app_root_url: String,
    /// Preferred display name used instead of a random animal name.
    pub display_name: Option<String>,
    /// Languages that get a buffer, in tab order.
    pub languages: Vec<Language>,
    /// Tab opened on join.
    pub default_language: Language,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_root_url: DEFAULT_APP_ROOT_URL.into(),
            display_name: None,
            languages: Language::ALL.to_vec(),
            default_language: Language::Cpp,
            log_filter: "info".into(),
        }
    }
}

impl ClientConfig {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Apply `LIVECODE_*` environment overrides.
    pub fn apply_env_overrides(self) -> Self {
        self.apply_env_fn(|key| std::env::var(key))
    }

    /// Testable variant that accepts an environment lookup function.
    fn apply_env_fn<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        if let Ok(url) = env("LIVECODE_APP_ROOT_URL") {
            self.app_root_url = url;
        }
        if let Ok(name) = env("LIVECODE_DISPLAY_NAME") {
            self.display_name = Some(name).filter(|n| !n.trim().is_empty());
        }
        if let Ok(filter) = env("LIVECODE_LOG_FILTER") {
            self.log_filter = filter;
        }
        self
    }

    /// Public link to a workspace: `<app_root_url>/<handle>`.
    pub fn share_url(&self, handle: &WorkspaceHandle) -> Result<Url, url::ParseError> {
        let mut base = Url::parse(&self.app_root_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(handle.as_str())
    }

    /// Languages with a buffer, never empty.
    pub fn effective_languages(&self) -> Vec<Language> {
        if self.languages.is_empty() {
            Language::ALL.to_vec()
        } else {
            self.languages.clone()
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
