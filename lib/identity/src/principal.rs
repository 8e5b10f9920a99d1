//! The principal the gate establishes for a session.
//!
//! A principal pairs the verified identity with the statically configured
//! role grants. Downstream handlers read it from the per-request context.

use crate::identity::IdentityResult;
use crate::role::RoleSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication method recorded with every principal this gate registers.
pub const OPENID_AUTH_METHOD: &str = "OPENID";

/// An authenticated subject with its granted roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The verified identity.
    identity: IdentityResult,
    /// Roles granted by configuration.
    roles: RoleSet,
    /// How the identity was established.
    auth_method: String,
    /// When the identity was established.
    established_at: DateTime<Utc>,
}

impl Principal {
    /// Creates a principal established now through the OpenID flow.
    #[must_use]
    pub fn new(identity: IdentityResult, roles: RoleSet) -> Self {
        Self {
            identity,
            roles,
            auth_method: OPENID_AUTH_METHOD.to_string(),
            established_at: Utc::now(),
        }
    }

    /// Returns the principal name, which is the identity's identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        self.identity.identifier()
    }

    /// Returns the verified identity.
    #[must_use]
    pub fn identity(&self) -> &IdentityResult {
        &self.identity
    }

    /// Returns the granted roles.
    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Returns true if the role is granted.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Returns the authentication method.
    #[must_use]
    pub fn auth_method(&self) -> &str {
        &self.auth_method
    }

    /// Returns when the identity was established.
    #[must_use]
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}
