//! Error types for the gate crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `SessionStoreError`: Low-level session storage failures
//! - `GateError`: Failures the gate surfaces to the host (aborts the request)
//!
//! Protocol failures from the verifier never appear here. The gate absorbs
//! them and answers the request with a generic authentication failure.

use openid_gate_core::SessionId;
use std::fmt;

/// Errors from the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// The store's lock was poisoned by a panicking writer.
    Poisoned,
    /// The backing store rejected the operation.
    Backend { reason: String },
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poisoned => write!(f, "session store lock poisoned"),
            Self::Backend { reason } => write!(f, "session store failure: {reason}"),
        }
    }
}

impl std::error::Error for SessionStoreError {}

/// Errors the gate returns to the host.
///
/// Every variant aborts the request. The host should answer with a server
/// error and must not show `reason` to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Configuration, verifier initialization, or security context failure.
    Configuration { reason: String },
    /// The verifier reported success but produced no identity.
    Integrity { session: SessionId, reason: String },
    /// Session storage failed while the flow was in progress.
    SessionStore { session: SessionId, reason: String },
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { reason } => write!(f, "gate misconfigured: {reason}"),
            Self::Integrity { session, reason } => {
                write!(f, "integrity failure for session {session}: {reason}")
            }
            Self::SessionStore { session, reason } => {
                write!(f, "session store failed for session {session}: {reason}")
            }
        }
    }
}

impl std::error::Error for GateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_store_error_display() {
        assert!(SessionStoreError::Poisoned.to_string().contains("poisoned"));
        let err = SessionStoreError::Backend {
            reason: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn gate_error_display_names_session() {
        let session = SessionId::new();
        let err = GateError::Integrity {
            session,
            reason: "no identity".to_string(),
        };
        assert!(err.to_string().contains(&session.to_string()));
        assert!(err.to_string().contains("no identity"));
    }

    #[test]
    fn configuration_error_display() {
        let err = GateError::Configuration {
            reason: "role string is missing".to_string(),
        };
        assert!(err.to_string().starts_with("gate misconfigured"));
    }
}
