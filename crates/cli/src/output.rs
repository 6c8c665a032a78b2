// Terminal output for livecode commands.
//
// Results go to stdout, diagnostics to stderr. Without `--json` a terminal
// gets human text and a pipe gets one JSON object per line.

use livecode_session::{SessionError, StoreError};
use serde::Serialize;
use serde_json::json;
use std::io::{self, IsTerminal, Write};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            Self::Json
        } else {
            Self::detect_from_terminal(io::stdout().is_terminal())
        }
    }

    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Render a command result without the trailing newline.
pub fn render<T, F>(format: OutputFormat, value: &T, human_fn: F) -> serde_json::Result<String>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => Ok(human_fn(value)),
        OutputFormat::Json => serde_json::to_string(value),
    }
}

pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    let line = render(format, value, human_fn).map_err(io::Error::other)?;
    writeln!(io::stdout().lock(), "{line}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Error => ANSI_RED,
            Self::Warning => ANSI_YELLOW,
        }
    }
}

/// A coded diagnostic for stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Notice {
    severity: Severity,
    code: &'static str,
    message: String,
}

impl Notice {
    fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, code, message: message.into() }
    }

    /// JSON: `{"error": {"code", "message"}}` (or `"warning"`). Human: a
    /// `label: message` line, colored on a terminal.
    fn render(&self, format: OutputFormat, is_tty: bool) -> String {
        let label = self.severity.label();
        match format {
            OutputFormat::Json => {
                json!({ label: { "code": self.code, "message": self.message } }).to_string()
            }
            OutputFormat::Human if is_tty => {
                format!("{}{label}:{ANSI_RESET} {}", self.severity.color(), self.message)
            }
            OutputFormat::Human => format!("{label}: {}", self.message),
        }
    }

    fn emit(&self, format: OutputFormat) {
        let stderr = io::stderr();
        let line = self.render(format, stderr.is_terminal());
        let _ = writeln!(stderr.lock(), "{line}");
    }
}

pub fn print_warning(format: OutputFormat, code: &'static str, message: &str) {
    Notice { severity: Severity::Warning, code, message: message.to_string() }.emit(format);
}

/// Report a failed command with a stable code and a message the user can
/// act on.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    error_notice(error).emit(format);
}

fn error_notice(error: &anyhow::Error) -> Notice {
    if let Some(session) = error.chain().find_map(|cause| cause.downcast_ref::<SessionError>()) {
        return session_notice(session);
    }

    let message = format!("{error:#}");
    if message.contains("config already exists") {
        Notice::error("CONFIG_EXISTS", message)
    } else if message.contains("home directory") {
        Notice::error("CONFIG_UNAVAILABLE", "Could not locate ~/.livecode. Is $HOME set?")
    } else {
        Notice::error("SESSION_ERROR", message)
    }
}

fn session_notice(error: &SessionError) -> Notice {
    match error {
        SessionError::AccessRefused => Notice::error("ACCESS_REFUSED", error.to_string()),
        SessionError::Identity(_) => Notice::error("AUTH_FAILURE", error.to_string()),
        SessionError::PermissionDenied { required, actual } => Notice::error(
            "PERMISSION_DENIED",
            format!("Permission denied. Your role is {actual}, this requires {required}."),
        ),
        SessionError::InvalidDefault(level) => Notice::error(
            "INVALID_DEFAULT",
            format!("{level} cannot be a workspace default. Use PRIVATE, READ or READ_WRITE."),
        ),
        SessionError::NotJoined => {
            Notice::error("NOT_JOINED", "Join a workspace before changing its settings.")
        }
        SessionError::Store(StoreError::Disconnected) => {
            Notice::error("STORE_DISCONNECTED", "Lost the connection to the realtime store.")
        }
        SessionError::Store(_) => Notice::error("STORE_ERROR", error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livecode_common::types::{AccessLevel, Permission};
    use livecode_session::config::ClientConfig;
    use livecode_session::IdentityError;

    #[test]
    fn pipes_get_json_and_terminals_get_text() {
        assert_eq!(OutputFormat::detect_from_terminal(true), OutputFormat::Human);
        assert_eq!(OutputFormat::detect_from_terminal(false), OutputFormat::Json);
        assert_eq!(OutputFormat::detect(true), OutputFormat::Json);
    }

    #[test]
    fn json_render_of_config_skips_human_formatter() {
        let config = ClientConfig::default();
        let line = render(OutputFormat::Json, &config, |_| panic!("human formatter used")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["app_root_url"], "http://localhost:3000");
        assert_eq!(parsed["languages"], json!(["cpp", "java", "py"]));
    }

    #[test]
    fn human_render_uses_formatter() {
        let line = render(OutputFormat::Human, &AccessLevel::Read, |level| format!("default {level}"))
            .unwrap();
        assert_eq!(line, "default READ");
    }

    #[test]
    fn refusal_renders_json_error_envelope() {
        let err = anyhow::Error::new(SessionError::AccessRefused).context("stranger join failed");
        let line = error_notice(&err).render(OutputFormat::Json, false);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            parsed,
            json!({"error": {"code": "ACCESS_REFUSED", "message": "This file is private."}})
        );
    }

    #[test]
    fn sign_in_failure_keeps_provider_text() {
        let err = anyhow::Error::new(SessionError::Identity(IdentityError::new(
            "auth/operation-not-allowed",
            "Anonymous sign-in disabled",
        )));
        let notice = error_notice(&err);
        assert_eq!(notice.code, "AUTH_FAILURE");
        assert_eq!(
            notice.render(OutputFormat::Human, false),
            "error: Error signing in: auth/operation-not-allowed Anonymous sign-in disabled"
        );
    }

    #[test]
    fn permission_denied_names_both_roles() {
        let err = anyhow::Error::new(SessionError::PermissionDenied {
            required: Permission::Owner,
            actual: Permission::Read,
        });
        let notice = error_notice(&err);
        assert_eq!(notice.code, "PERMISSION_DENIED");
        assert_eq!(notice.message, "Permission denied. Your role is READ, this requires OWNER.");
    }

    #[test]
    fn owner_default_is_reported_with_allowed_levels() {
        let err = anyhow::Error::new(SessionError::InvalidDefault(AccessLevel::Owner));
        let notice = error_notice(&err);
        assert_eq!(notice.code, "INVALID_DEFAULT");
        assert!(notice.message.contains("PRIVATE, READ or READ_WRITE"));
    }

    #[test]
    fn store_disconnect_has_its_own_code() {
        let err = anyhow::Error::new(SessionError::Store(StoreError::Disconnected));
        assert_eq!(error_notice(&err).code, "STORE_DISCONNECTED");
    }

    #[test]
    fn existing_config_maps_to_config_exists() {
        let err = anyhow::anyhow!("config already exists at /tmp/x; pass --force to overwrite");
        let notice = error_notice(&err);
        assert_eq!(notice.code, "CONFIG_EXISTS");
        assert!(notice.message.contains("--force"));
    }

    #[test]
    fn unknown_errors_pass_through() {
        let notice = error_notice(&anyhow::anyhow!("something odd"));
        assert_eq!(notice, Notice::error("SESSION_ERROR", "something odd"));
    }

    #[test]
    fn warnings_are_yellow_on_a_terminal_only() {
        let notice = Notice {
            severity: Severity::Warning,
            code: "CONFIG_INVALID",
            message: "bad config".into(),
        };
        assert_eq!(
            notice.render(OutputFormat::Human, true),
            format!("{ANSI_YELLOW}warning:{ANSI_RESET} bad config")
        );
        assert_eq!(notice.render(OutputFormat::Human, false), "warning: bad config");
        let parsed: serde_json::Value =
            serde_json::from_str(&notice.render(OutputFormat::Json, false)).unwrap();
        assert_eq!(parsed["warning"]["code"], "CONFIG_INVALID");
    }
}
