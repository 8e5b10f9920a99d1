//! Error types for the identity crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ConfigurationError`: Startup and wiring failures, never retried
//! - `ProtocolError`: Provider callback failures, absorbed by the gate
//! - `IntegrityError`: Collaborators contradicting each other
//! - `RegistrationError`: Host principal bookkeeping outcomes

use std::fmt;

/// Errors from configuring the gate or its collaborators.
///
/// These are fatal: a request that hits one is aborted with an error status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The role string was not supplied.
    MissingRoleString,
    /// The role string could not be tokenized into role names.
    MalformedRoleString { value: String, reason: String },
    /// An attribute list contains an invalid entry.
    MalformedAttributeList { list: String, reason: String },
    /// The return URL is not a valid absolute URL after expansion.
    InvalidReturnUrl { value: String, reason: String },
    /// The landing page is not an absolute path.
    InvalidLandingPage { value: String },
    /// The verifier could not be initialized.
    VerifierInitialization { reason: String },
    /// The verifier was asked to initialize a second time.
    AlreadyInitialized,
    /// Neither registration call shape is supported by the host.
    RegistrationUnavailable,
    /// A security context could not be created or installed.
    SecurityContext { reason: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoleString => write!(f, "role string is missing from configuration"),
            Self::MalformedRoleString { value, reason } => {
                write!(f, "malformed role string '{value}': {reason}")
            }
            Self::MalformedAttributeList { list, reason } => {
                write!(f, "malformed attribute list '{list}': {reason}")
            }
            Self::InvalidReturnUrl { value, reason } => {
                write!(f, "invalid return URL '{value}': {reason}")
            }
            Self::InvalidLandingPage { value } => {
                write!(f, "landing page '{value}' must be an absolute path")
            }
            Self::VerifierInitialization { reason } => {
                write!(f, "verifier initialization failed: {reason}")
            }
            Self::AlreadyInitialized => write!(f, "verifier is already initialized"),
            Self::RegistrationUnavailable => {
                write!(f, "host supports no known principal registration call")
            }
            Self::SecurityContext { reason } => {
                write!(f, "security context unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Errors reported by the verifier while processing a provider callback.
///
/// The gate never shows these to the user; they only mean that
/// authentication did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A callback parameter is missing.
    MissingParameter { name: String },
    /// The provider redirected back with an error parameter.
    ProviderDenied {
        error: String,
        description: Option<String>,
    },
    /// The returned state does not match the pending request.
    StateMismatch,
    /// No pending authentication request exists for this browser.
    NoPendingRequest,
    /// The provider's token endpoint rejected the exchange.
    TokenExchange { reason: String },
    /// Signature, nonce or audience validation failed.
    TokenValidation { reason: String },
    /// A required attribute was not supplied by the provider.
    MissingAttribute { name: String },
    /// The provider cannot be reached or the verifier is not ready.
    Unavailable { reason: String },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter { name } => {
                write!(f, "callback parameter '{name}' is missing")
            }
            Self::ProviderDenied { error, description } => match description {
                Some(description) => write!(f, "provider denied request: {error} ({description})"),
                None => write!(f, "provider denied request: {error}"),
            },
            Self::StateMismatch => write!(f, "callback state does not match pending request"),
            Self::NoPendingRequest => write!(f, "no pending authentication request"),
            Self::TokenExchange { reason } => write!(f, "token exchange failed: {reason}"),
            Self::TokenValidation { reason } => write!(f, "token validation failed: {reason}"),
            Self::MissingAttribute { name } => {
                write!(f, "required attribute '{name}' was not supplied")
            }
            Self::Unavailable { reason } => write!(f, "identity provider unavailable: {reason}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Errors where collaborators contradict each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// The verifier reported success without producing an identity.
    MissingIdentity,
    /// The session finished the flow but carries no principal.
    MissingPrincipal,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIdentity => write!(
                f,
                "callback succeeded but produced no identity; check the realm configuration"
            ),
            Self::MissingPrincipal => {
                write!(f, "flow finished but the session carries no principal")
            }
        }
    }
}

impl std::error::Error for IntegrityError {}

/// Outcome of a failed principal registration with the host.
///
/// Kept as a plain enum so callers can branch on `Unsupported`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// This call shape does not exist in the running host.
    Unsupported,
    /// The call exists but failed.
    Failed { reason: String },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "registration call is not supported by the host"),
            Self::Failed { reason } => write!(f, "registration failed: {reason}"),
        }
    }
}

impl std::error::Error for RegistrationError {}
