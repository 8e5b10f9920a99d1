//! The external verifier and realm seams.
//!
//! The verifier speaks the provider protocol: it builds the authentication
//! redirect and validates the callback. The realm decides whether a
//! verified identity is acceptable here.

use crate::request::{GateRequest, GateResponse};
use async_trait::async_trait;
use openid_gate_identity::{
    AttributeRequest, ConfigurationError, IdentityResult, Principal, ProtocolError, RoleSet,
};
use rootcause::prelude::Report;
use url::Url;

/// Everything a verifier is initialized with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierSettings {
    /// Where the provider sends the browser back, when overridden.
    pub return_url: Option<Url>,
    /// Attributes to request from the provider.
    pub attributes: AttributeRequest,
    /// Roles granted to established identities.
    pub roles: RoleSet,
}

/// Speaks the provider protocol on the gate's behalf.
#[async_trait]
pub trait ExternalVerifier: Send + Sync {
    /// Returns true once `initialize` has succeeded.
    fn is_initialized(&self) -> bool;

    /// Prepares the verifier. Called at most once by a gate.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the provider cannot be used.
    async fn initialize(&self, settings: &VerifierSettings) -> Result<(), Report<ConfigurationError>>;

    /// Writes the redirect to the provider into `response`.
    ///
    /// Returns true if the response now carries the redirect.
    ///
    /// # Errors
    ///
    /// Returns a `ProtocolError` if no request could be built.
    async fn prepare_and_send_auth_request(
        &self,
        request: &GateRequest,
        response: &mut GateResponse,
    ) -> Result<bool, Report<ProtocolError>>;

    /// Validates a provider callback.
    ///
    /// Returns `Ok(None)` if the callback verified but `realm` refused the
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns a `ProtocolError` if the callback does not verify.
    async fn process_incoming_auth_result(
        &self,
        request: &GateRequest,
        response: &mut GateResponse,
        realm: &dyn Realm,
    ) -> Result<Option<IdentityResult>, Report<ProtocolError>>;
}

/// Decides which verified identities are accepted.
pub trait Realm: Send + Sync {
    /// Returns true if the identity may establish a principal.
    fn admits(&self, identity: &IdentityResult) -> bool;

    /// Returns true if the principal holds `role`.
    fn has_role(&self, principal: &Principal, role: &str) -> bool {
        principal.has_role(role)
    }
}

/// Accepts every identity, optionally restricted to certain providers.
#[derive(Debug, Clone, Default)]
pub struct StaticRealm {
    providers: Vec<String>,
}

impl StaticRealm {
    /// Creates a realm that accepts any provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts accepted identities to providers on `host`.
    #[must_use]
    pub fn allow_provider_host(mut self, host: impl Into<String>) -> Self {
        self.providers.push(host.into());
        self
    }
}

impl Realm for StaticRealm {
    fn admits(&self, identity: &IdentityResult) -> bool {
        if self.providers.is_empty() {
            return true;
        }
        identity
            .provider_url()
            .host_str()
            .is_some_and(|host| self.providers.iter().any(|allowed| allowed == host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openid_gate_identity::Attributes;

    fn identity(provider: &str) -> IdentityResult {
        IdentityResult::new(
            "alice",
            Url::parse(provider).expect("valid url"),
            Attributes::new(),
        )
        .expect("valid identity")
    }

    #[test]
    fn open_realm_admits_everyone() {
        assert!(StaticRealm::new().admits(&identity("https://any.example/")));
    }

    #[test]
    fn restricted_realm_checks_provider_host() {
        let realm = StaticRealm::new().allow_provider_host("idp.example");
        assert!(realm.admits(&identity("https://idp.example/alice")));
        assert!(!realm.admits(&identity("https://evil.example/alice")));
    }

    #[test]
    fn has_role_defaults_to_principal_roles() {
        let principal = Principal::new(
            identity("https://idp.example/"),
            RoleSet::from_names(["user"]),
        );
        let realm = StaticRealm::new();
        assert!(realm.has_role(&principal, "user"));
        assert!(!realm.has_role(&principal, "admin"));
    }
}
