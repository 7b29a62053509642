//! Domain types for the state protocol.
//!
//! `LockInfo` mirrors the lock record exchanged by Terraform/OpenTofu's
//! `http` backend. Field names are serialized verbatim (`ID`, `Who`, ...)
//! because the client expects them that way.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ── Locks ──────────────────────────────────────────────────────────

/// A lock claim submitted by a client.
///
/// Only `id` takes part in protocol decisions; every other field is
/// advisory and echoed back to competing clients so they can report
/// who holds the lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Operation")]
    pub operation: String,
    #[serde(rename = "Info")]
    pub info: String,
    #[serde(rename = "Who")]
    pub who: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Created")]
    pub created: String,
    #[serde(rename = "Path")]
    pub path: String,
}

impl LockInfo {
    /// A claim carrying only an identifier.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Whether this claim refers to the same lock as `other`.
    pub fn same_claim(&self, other: &LockInfo) -> bool {
        self.id == other.id
    }
}

// ── State names ────────────────────────────────────────────────────

/// Logical identifier of one state document.
///
/// Derived from a request path with surrounding slashes removed.
/// Inner slashes are kept, so `org/project` is a valid name. Every
/// segment is a literal directory name: empty, `.` and `..` segments are
/// refused, so two names never resolve to the same storage path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateName(String);

impl StateName {
    /// Extract a state name from a request path.
    ///
    /// Returns `None` when nothing is left after trimming, or when any
    /// segment is empty, `.` or `..`.
    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.trim_matches('/');
        if name.is_empty() {
            return None;
        }
        if name.split('/').any(|seg| matches!(seg, "" | "." | "..")) {
            return None;
        }
        Some(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Top-level directory holding every state document.
pub const STATE_ROOT: &str = "states";

/// File name of the state document inside its directory.
pub const STATE_FILE: &str = "terraform.tfstate";

/// Storage path for a state name: `states/{name}/terraform.tfstate`.
///
/// The name is used verbatim, so distinct names never share a path.
pub fn state_path(name: &StateName) -> String {
    format!("{STATE_ROOT}/{}/{STATE_FILE}", name.as_str())
}

// ── Stored content ─────────────────────────────────────────────────

/// State content as returned by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredState {
    /// Raw document bytes, never interpreted by the server.
    pub content: Bytes,
    /// Backend revision token (a blob SHA for git-backed stores).
    pub revision: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_name_trims_slashes() {
        let cases = [
            ("/myproject", "myproject"),
            ("/myproject/", "myproject"),
            ("myproject", "myproject"),
            ("/org/project", "org/project"),
            ("//nested//", "nested"),
        ];
        for (path, expected) in cases {
            let name = StateName::from_path(path).unwrap();
            assert_eq!(name.as_str(), expected, "path {path}");
        }
    }

    #[test]
    fn empty_state_name_is_rejected() {
        assert!(StateName::from_path("").is_none());
        assert!(StateName::from_path("/").is_none());
        assert!(StateName::from_path("///").is_none());
    }

    #[test]
    fn relative_segments_are_rejected() {
        for path in ["./b", "/./b", "a/../b", "../../../x", "a/.", "..", ".", "a//b"] {
            assert!(StateName::from_path(path).is_none(), "path {path}");
        }
    }

    #[test]
    fn dotted_names_are_literal() {
        for path in ["v1.2", "a/.hidden", "env..prod", "a/b.c/d"] {
            let name = StateName::from_path(path).unwrap();
            assert_eq!(name.as_str(), path);
        }
    }

    #[test]
    fn state_path_layout() {
        let name = StateName::from_path("/myproject").unwrap();
        assert_eq!(state_path(&name), "states/myproject/terraform.tfstate");

        let nested = StateName::from_path("/org/project/").unwrap();
        assert_eq!(state_path(&nested), "states/org/project/terraform.tfstate");
    }

    #[test]
    fn lock_info_uses_wire_field_names() {
        let lock = LockInfo {
            id: "lock-123".to_string(),
            operation: "OperationTypeApply".to_string(),
            who: "user@host".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&lock).unwrap();
        assert_eq!(json["ID"], "lock-123");
        assert_eq!(json["Operation"], "OperationTypeApply");
        assert_eq!(json["Who"], "user@host");
        assert_eq!(json["Path"], "");
    }

    #[test]
    fn lock_info_missing_fields_default_to_empty() {
        let lock: LockInfo = serde_json::from_str(r#"{"ID":"a"}"#).unwrap();
        assert_eq!(lock, LockInfo::with_id("a"));

        let force: LockInfo = serde_json::from_str("{}").unwrap();
        assert!(force.id.is_empty());
    }

    #[test]
    fn same_claim_compares_only_id() {
        let a = LockInfo {
            id: "a".to_string(),
            who: "alice".to_string(),
            ..Default::default()
        };
        let a_again = LockInfo {
            id: "a".to_string(),
            who: "someone else".to_string(),
            ..Default::default()
        };
        assert!(a.same_claim(&a_again));
        assert!(!a.same_claim(&LockInfo::with_id("b")));
    }
}
