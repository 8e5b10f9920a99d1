//! Startup error types for the server binary.
//!
//! Request-time failures never surface here: the gate middleware logs them
//! and answers with a status code.

use std::fmt;

/// Failures that prevent the server from starting or keep it from serving.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded from the environment.
    Config { reason: String },
    /// The gate configuration did not validate.
    Gate { reason: String },
    /// The OIDC verifier could not be created.
    Verifier { reason: String },
    /// The listener could not be bound.
    Bind { address: String, reason: String },
    /// The server stopped with an I/O error.
    Serve { reason: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "failed to load configuration: {reason}"),
            Self::Gate { reason } => write!(f, "invalid gate configuration: {reason}"),
            Self::Verifier { reason } => write!(f, "failed to create verifier: {reason}"),
            Self::Bind { address, reason } => write!(f, "failed to bind to {address}: {reason}"),
            Self::Serve { reason } => write!(f, "server error: {reason}"),
        }
    }
}

impl std::error::Error for StartupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_address() {
        let err = StartupError::Bind {
            address: "127.0.0.1:3000".to_string(),
            reason: "address in use".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to bind to 127.0.0.1:3000: address in use"
        );
    }

    #[test]
    fn gate_error_carries_reason() {
        let err = StartupError::Gate {
            reason: "role string is missing from configuration".to_string(),
        };
        assert!(err.to_string().contains("role string"));
    }
}
