//! Strongly-typed identifiers.
//!
//! Identifiers are ULIDs, so a session cookie value or a snapshot handle
//! can be validated before it is used as a store key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed ID wrapper around ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Creates an ID from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Bare ULIDs are accepted so stored values parse as well.
                let raw = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);

                Ulid::from_str(raw)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }
    };
}

define_id!(
    /// Identifier of an HTTP session, carried in the session cookie.
    SessionId,
    "sess"
);

define_id!(
    /// Handle of a request captured before redirecting to the provider.
    SnapshotId,
    "snap"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display_format() {
        let id = SessionId::new();
        assert!(id.to_string().starts_with("sess_"));
    }

    #[test]
    fn snapshot_id_display_format() {
        let id = SnapshotId::new();
        assert!(id.to_string().starts_with("snap_"));
    }

    #[test]
    fn parse_with_prefix() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().expect("should parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_without_prefix() {
        let ulid = Ulid::new();
        let id: SessionId = ulid.to_string().parse().expect("should parse");
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn parse_rejects_tampered_cookie_value() {
        let err = "sess_../../etc/passwd"
            .parse::<SessionId>()
            .expect_err("should not parse");
        assert_eq!(err.id_type, "SessionId");
    }

    #[test]
    fn session_id_serializes_as_bare_ulid() {
        let ulid = Ulid::new();
        let id = SessionId::from_ulid(ulid);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{ulid}\""));
    }
}
