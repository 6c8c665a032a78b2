// Core domain types shared across all livecode crates.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown permission level: {0}")]
pub struct ParseLevelError(pub String);

/// Workspace-wide access level, as stored in `settings.defaultPermission`.
///
/// Ordered from least to most privileged. `Private` only ever appears as a
/// workspace default; it gates entry and is never assigned to a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    Private,
    Read,
    ReadWrite,
    Owner,
}

impl AccessLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::Read => "READ",
            Self::ReadWrite => "READ_WRITE",
            Self::Owner => "OWNER",
        }
    }

    /// The permission a user without a stored role receives under this
    /// default. `None` means entry is refused.
    pub const fn effective(self) -> Option<Permission> {
        match self {
            Self::Private => None,
            Self::Read => Some(Permission::Read),
            Self::ReadWrite => Some(Permission::ReadWrite),
            Self::Owner => Some(Permission::Owner),
        }
    }

    /// Whether this level may be stored as a workspace default. `Owner` is
    /// only ever granted on the creator's own record.
    pub const fn is_valid_default(self) -> bool {
        !matches!(self, Self::Owner)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRIVATE" => Ok(Self::Private),
            "READ" => Ok(Self::Read),
            "READ_WRITE" => Ok(Self::ReadWrite),
            "OWNER" => Ok(Self::Owner),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

/// Permission actually applied to a user inside a workspace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Read,
    ReadWrite,
    Owner,
}

impl Permission {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::ReadWrite => "READ_WRITE",
            Self::Owner => "OWNER",
        }
    }

    /// Role hierarchy check: `Owner` allows everything, `ReadWrite` allows
    /// `ReadWrite` and `Read`, `Read` allows only `Read`.
    pub fn allows(self, required: Permission) -> bool {
        self >= required
    }

    pub fn can_edit(self) -> bool {
        self.allows(Self::ReadWrite)
    }

    /// Label shown next to a collaborator in the user list.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Read => "View Only",
            Self::ReadWrite => "Read & Write",
            Self::Owner => "Owner",
        }
    }
}

impl From<Permission> for AccessLevel {
    fn from(permission: Permission) -> Self {
        match permission {
            Permission::Read => Self::Read,
            Permission::ReadWrite => Self::ReadWrite,
            Permission::Owner => Self::Owner,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READ" => Ok(Self::Read),
            "READ_WRITE" => Ok(Self::ReadWrite),
            "OWNER" => Ok(Self::Owner),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

/// A language with its own synchronized buffer in every workspace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Cpp,
    Java,
    Py,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Cpp, Language::Java, Language::Py];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Py => "py",
        }
    }

    /// Child key of the buffer channel under the workspace root.
    pub const fn channel_key(self) -> &'static str {
        match self {
            Self::Cpp => "editor-cpp",
            Self::Java => "editor-java",
            Self::Py => "editor-py",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cpp => "C++",
            Self::Java => "Java",
            Self::Py => "Python 3",
        }
    }

    /// Syntax mode handed to the editor widget.
    pub const fn editor_mode(self) -> &'static str {
        match self {
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Py => "python",
        }
    }

    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Cpp => "myfile.cpp",
            Self::Java => "myfile.java",
            Self::Py => "myfile.py",
        }
    }

    /// Starter template seeded into an empty buffer.
    pub const fn default_code(self) -> &'static str {
        match self {
            Self::Cpp => {
                "#include <bits/stdc++.h>\nusing namespace std;\n\nint main() {\n\tios_base::sync_with_stdio(0);\n\tcin.tie(0);\n\n}\n"
            }
            Self::Java => {
                "import java.io.*;\nimport java.util.*;\n\npublic class Main {\n\tpublic static void main(String[] args) throws IOException {\n\t\tBufferedReader br = new BufferedReader(new InputStreamReader(System.in));\n\n\t}\n}\n"
            }
            Self::Py => "import sys\ninput = sys.stdin.readline\n\n",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Language {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpp" => Ok(Self::Cpp),
            "java" => Ok(Self::Java),
            "py" | "python" => Ok(Self::Py),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

/// A collaborator's record under `users/<id>`.
///
/// Parsed leniently: records written by older clients (or half-written by a
/// racing tab) still load, with unknown permission strings dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_permission",
        skip_serializing_if = "Option::is_none"
    )]
    pub permission: Option<Permission>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub connections: BTreeMap<String, serde_json::Value>,
}

impl UserEntry {
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// A user without a stored name has never completed a join here.
    pub fn is_first_join(&self) -> bool {
        self.name.is_none()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_online(&self) -> bool {
        !self.connections.is_empty()
    }
}

fn lenient_permission<'de, D>(deserializer: D) -> Result<Option<Permission>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.as_str().and_then(|s| s.parse().ok())))
}

/// One row of the collaborator list shown to every participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnlineUser {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<Permission>,
    pub online: bool,
    pub connections: usize,
}

impl OnlineUser {
    /// Build a list row from a stored entry. Entries with no name yet are
    /// mid-join and are not listed.
    pub fn from_entry(id: &str, entry: &UserEntry) -> Option<Self> {
        let name = entry.name.clone()?;
        Some(Self {
            id: id.to_string(),
            name,
            color: entry.color.clone().unwrap_or_default(),
            permission: entry.permission,
            online: entry.is_online(),
            connections: entry.connection_count(),
        })
    }

    /// `"Anonymous Otter (Me) (Online)"`.
    pub fn display_line(&self, me: Option<&str>) -> String {
        let mut line = self.name.clone();
        if me == Some(self.id.as_str()) {
            line.push_str(" (Me)");
        }
        line.push_str(if self.online { " (Online)" } else { " (Offline)" });
        line
    }

    pub fn role_label(&self) -> Option<&'static str> {
        self.permission.map(Permission::label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn owner_is_never_a_workspace_default() {
        assert!(AccessLevel::Private.is_valid_default());
        assert!(AccessLevel::Read.is_valid_default());
        assert!(AccessLevel::ReadWrite.is_valid_default());
        assert!(!AccessLevel::Owner.is_valid_default());
    }

    #[test]
    fn permission_hierarchy_allows_lower_levels() {
        assert!(Permission::Owner.allows(Permission::ReadWrite));
        assert!(Permission::ReadWrite.allows(Permission::Read));
        assert!(!Permission::Read.allows(Permission::ReadWrite));
        assert!(!Permission::ReadWrite.allows(Permission::Owner));
    }

    #[test]
    fn only_write_capable_permissions_can_edit() {
        assert!(!Permission::Read.can_edit());
        assert!(Permission::ReadWrite.can_edit());
        assert!(Permission::Owner.can_edit());
    }

    #[test]
    fn access_levels_serialize_as_screaming_snake() {
        assert_eq!(serde_json::to_value(AccessLevel::ReadWrite).unwrap(), json!("READ_WRITE"));
        assert_eq!(serde_json::to_value(AccessLevel::Private).unwrap(), json!("PRIVATE"));
        assert_eq!(serde_json::to_value(Permission::Owner).unwrap(), json!("OWNER"));
    }

    #[test]
    fn private_default_has_no_effective_permission() {
        assert_eq!(AccessLevel::Private.effective(), None);
        assert_eq!(AccessLevel::Read.effective(), Some(Permission::Read));
        assert_eq!(AccessLevel::ReadWrite.effective(), Some(Permission::ReadWrite));
    }

    #[test]
    fn access_level_order_matches_privilege() {
        assert!(AccessLevel::Private < AccessLevel::Read);
        assert!(AccessLevel::Read < AccessLevel::ReadWrite);
        assert!(AccessLevel::ReadWrite < AccessLevel::Owner);
    }

    #[test]
    fn parse_rejects_unknown_levels() {
        assert_eq!("READ".parse::<AccessLevel>(), Ok(AccessLevel::Read));
        assert!("ADMIN".parse::<AccessLevel>().is_err());
        assert!("PRIVATE".parse::<Permission>().is_err());
    }

    #[test]
    fn language_keys_match_channel_layout() {
        assert_eq!(Language::Cpp.channel_key(), "editor-cpp");
        assert_eq!(Language::Java.channel_key(), "editor-java");
        assert_eq!(Language::Py.channel_key(), "editor-py");
        assert_eq!(Language::Py.editor_mode(), "python");
        assert_eq!("python".parse::<Language>(), Ok(Language::Py));
    }

    #[test]
    fn user_entry_parses_owner_record() {
        let entry = UserEntry::from_json(&json!({
            "name": "Anonymous Otter",
            "color": "#e06c75",
            "permission": "OWNER",
            "connections": { "first": 1700000000000_i64 }
        }))
        .unwrap();
        assert_eq!(entry.permission, Some(Permission::Owner));
        assert!(entry.is_online());
        assert!(!entry.is_first_join());
    }

    #[test]
    fn user_entry_drops_unknown_permission() {
        let entry =
            UserEntry::from_json(&json!({"name": "Bob", "permission": "SUPERUSER"})).unwrap();
        assert_eq!(entry.permission, None);
    }

    #[test]
    fn user_entry_without_connections_is_offline() {
        let entry = UserEntry::from_json(&json!({"name": "Bob", "color": "#fff"})).unwrap();
        assert!(!entry.is_online());
        assert_eq!(entry.connection_count(), 0);
    }

    #[test]
    fn user_entry_without_name_is_first_join() {
        let entry = UserEntry::from_json(&json!({"connections": {"-abc": 1}})).unwrap();
        assert!(entry.is_first_join());
        assert!(OnlineUser::from_entry("u1", &entry).is_none());
    }

    #[test]
    fn owner_entry_serializes_without_empty_fields() {
        let entry = UserEntry {
            name: Some("Alice".into()),
            color: None,
            permission: None,
            connections: BTreeMap::new(),
        };
        assert_eq!(serde_json::to_value(&entry).unwrap(), json!({"name": "Alice"}));
    }

    #[test]
    fn display_line_marks_self_and_presence() {
        let user = OnlineUser {
            id: "u1".into(),
            name: "Anonymous Otter".into(),
            color: "#123456".into(),
            permission: Some(Permission::Owner),
            online: true,
            connections: 2,
        };
        assert_eq!(user.display_line(Some("u1")), "Anonymous Otter (Me) (Online)");
        assert_eq!(user.display_line(Some("u2")), "Anonymous Otter (Online)");
        assert_eq!(user.role_label(), Some("Owner"));
    }
}
