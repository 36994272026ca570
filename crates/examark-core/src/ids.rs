//! Branded ID newtypes for type safety.
//!
//! Every entity in the Examark system has a distinct ID type implemented as a
//! newtype wrapper around `String`. This prevents accidentally passing a
//! message ID where a session ID is expected.
//!
//! Freshly minted IDs are UUID v7 (time-ordered) generated via
//! [`uuid::Uuid::now_v7`]. Session IDs additionally distinguish *temporary*
//! identities (`temp-` prefixed), which a session carries between local
//! creation and the first server acknowledgment.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix marking a session identity that has not been acknowledged by the
/// server yet. Temporary sessions are never listed and never cached.
pub const TEMP_SESSION_PREFIX: &str = "temp-";

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a marking session.
    SessionId
}

branded_id! {
    /// Unique identifier for a message within a session.
    MessageId
}

branded_id! {
    /// Unique identifier for an account, as used by the sessions API.
    UserId
}

impl SessionId {
    /// Mint a temporary session identity (`temp-` + UUID v7).
    ///
    /// A session holds a temporary ID from local creation until the first
    /// server result arrives carrying the permanent one.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMP_SESSION_PREFIX}{}", new_v7()))
    }

    /// Whether this ID is a temporary (not yet server-acknowledged) identity.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_SESSION_PREFIX)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_new_is_uuid_v7() {
        let id = SessionId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn message_id_new_is_uuid_v7() {
        let id = MessageId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn ids_are_unique() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn temporary_ids_carry_the_prefix() {
        let id = SessionId::temporary();
        assert!(id.is_temporary());
        assert!(id.as_str().starts_with("temp-"));
        let tail = &id.as_str()[TEMP_SESSION_PREFIX.len()..];
        let parsed = Uuid::parse_str(tail).expect("suffix should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn fresh_ids_are_not_temporary() {
        assert!(!SessionId::new().is_temporary());
        assert!(!SessionId::from("sess-42").is_temporary());
    }

    #[test]
    fn temporary_ids_are_unique() {
        assert_ne!(SessionId::temporary(), SessionId::temporary());
    }

    #[test]
    fn from_string() {
        let id = SessionId::from_string("custom-id".to_owned());
        assert_eq!(id.as_str(), "custom-id");
    }

    #[test]
    fn from_str_ref() {
        let id = UserId::from("user-7");
        assert_eq!(id.as_str(), "user-7");
    }

    #[test]
    fn deref_to_str() {
        let id = MessageId::from("hello");
        let s: &str = &id;
        assert_eq!(s, "hello");
    }

    #[test]
    fn display() {
        let id = SessionId::from("display-me");
        assert_eq!(format!("{id}"), "display-me");
    }

    #[test]
    fn into_string() {
        let id = SessionId::from("convert");
        let s: String = id.into();
        assert_eq!(s, "convert");
    }

    #[test]
    fn serde_roundtrip() {
        let id = SessionId::from("serde-test");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"serde-test\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn serde_in_struct() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Envelope {
            id: MessageId,
            session_id: SessionId,
        }

        let env = Envelope {
            id: MessageId::from("msg-1"),
            session_id: SessionId::from("sess-1"),
        };
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(env, back);
    }

    #[test]
    fn hash_and_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let id = MessageId::from("same");
        let _ = set.insert(id.clone());
        let _ = set.insert(id.clone());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn into_inner() {
        let id = SessionId::from("inner-test");
        let inner = id.into_inner();
        assert_eq!(inner, "inner-test");
    }
}
