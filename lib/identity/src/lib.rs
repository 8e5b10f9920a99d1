//! Identity model for the openid-gate relying party.
//!
//! This crate provides:
//! - The verified identity returned by a provider round-trip (`IdentityResult`)
//! - The principal established for a session (`Principal`, `RoleSet`)
//! - Attribute requests and gate configuration (`AttributeRequest`, `GateConfig`)
//! - The error taxonomy shared by the gate and its collaborators
//!
//! # Example
//!
//! ```
//! use openid_gate_identity::{Attributes, GateConfig, IdentityResult, Principal};
//! use url::Url;
//!
//! let prepared = GateConfig::builder("user,auditor")
//!     .optional_attributes("name")
//!     .build()
//!     .prepare()
//!     .expect("valid configuration");
//!
//! let mut attributes = Attributes::new();
//! attributes.insert("email".to_string(), vec!["alice@example.com".to_string()]);
//! let identity = IdentityResult::new(
//!     "alice",
//!     Url::parse("https://idp.example/alice").expect("valid url"),
//!     attributes,
//! )
//! .expect("non-empty identifier");
//!
//! let principal = Principal::new(identity, prepared.roles.clone());
//! assert_eq!(principal.name(), "alice");
//! assert!(principal.has_role("auditor"));
//! ```

pub mod attributes;
pub mod config;
pub mod error;
pub mod identity;
pub mod principal;
pub mod role;

// Re-export main types at crate root
pub use attributes::AttributeRequest;
pub use config::{GateConfig, GateConfigBuilder, PreparedConfig};
pub use error::{ConfigurationError, IntegrityError, ProtocolError, RegistrationError};
pub use identity::{Attributes, EmptyIdentifier, IdentityResult};
pub use principal::{OPENID_AUTH_METHOD, Principal};
pub use role::RoleSet;
