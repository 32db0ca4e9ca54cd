//! Shared identifier and actor types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::nuid;

/// Opaque record identifier assigned at creation time.
///
/// Ids are minted from the process-wide [`nuid`](crate::nuid) source and
/// treated as plain strings on the wire and in the metadata store. The
/// default value is the empty id, used the same way the store's zero value
/// is: "no record".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Mint a fresh unique id.
    pub fn new() -> Self {
        Id(nuid::next())
    }

    /// Borrow the raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the zero value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id(s)
    }
}

/// Kind of principal a control request originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorKind {
    /// A deployed application identity.
    Application,
    /// An SDK client acting over the direct wire protocol.
    Sdk,
    /// A human user authenticated against the management API.
    UserRole,
}

/// The principal a lifecycle operation is attributed to in audit logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub username: String,
    pub kind: ActorKind,
}

impl Actor {
    pub fn application(username: impl Into<String>) -> Self {
        Actor {
            username: username.into(),
            kind: ActorKind::Application,
        }
    }

    pub fn sdk(username: impl Into<String>) -> Self {
        Actor {
            username: username.into(),
            kind: ActorKind::Sdk,
        }
    }

    pub fn user(username: impl Into<String>) -> Self {
        Actor {
            username: username.into(),
            kind: ActorKind::UserRole,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Id::new();
        let b = Id::new();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_default_id_is_empty() {
        assert!(Id::default().is_empty());
        assert_eq!(Id::default().to_string(), "");
    }

    #[test]
    fn test_id_serde_is_transparent() {
        let id = Id::from("abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_actor_kind_wire_form() {
        assert_eq!(
            serde_json::to_string(&ActorKind::Application).unwrap(),
            "\"application\""
        );
        assert_eq!(serde_json::to_string(&ActorKind::Sdk).unwrap(), "\"sdk\"");
        assert_eq!(
            serde_json::to_string(&ActorKind::UserRole).unwrap(),
            "\"user-role\""
        );
    }
}
