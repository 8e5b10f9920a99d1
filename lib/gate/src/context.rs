//! Per-request identity context and the privileged security context hooks.
//!
//! A fresh [`RequestContext`] is created by the host for every request and
//! dropped with it. Nothing identity-related outlives the request except
//! what the session store holds.

use openid_gate_identity::{ConfigurationError, Principal, RoleSet};
use rootcause::prelude::Report;

/// The security domain a host installs contexts into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLoader {
    security_domain: String,
}

impl ContextLoader {
    #[must_use]
    pub fn new(security_domain: impl Into<String>) -> Self {
        Self {
            security_domain: security_domain.into(),
        }
    }

    #[must_use]
    pub fn security_domain(&self) -> &str {
        &self.security_domain
    }
}

/// A host security context carrying the authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    domain: String,
    principal: Option<Principal>,
}

impl SecurityContext {
    /// Creates an empty context for `domain`.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            principal: None,
        }
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }
}

/// Identity state for a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    principal: Option<Principal>,
    security_context: Option<SecurityContext>,
}

impl RequestContext {
    /// Creates an unauthenticated context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that already carries a principal, as when the host
    /// restores one from its own session bookkeeping.
    #[must_use]
    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            security_context: None,
        }
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Roles of the current principal, if any.
    #[must_use]
    pub fn roles(&self) -> Option<&RoleSet> {
        self.principal.as_ref().map(Principal::roles)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    #[must_use]
    pub fn security_context(&self) -> Option<&SecurityContext> {
        self.security_context.as_ref()
    }

    pub fn attach(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    pub(crate) fn set_security_context(&mut self, context: SecurityContext) {
        self.security_context = Some(context);
    }
}

/// Host hooks for installing a security context.
///
/// Hosts that guard these operations behind a privilege check implement
/// this trait to run them with the required privileges.
pub trait PrivilegedContextAccess: Send + Sync {
    /// Returns the loader naming the active security domain.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if no domain is available.
    fn context_loader(&self) -> Result<ContextLoader, Report<ConfigurationError>>;

    /// Creates an empty security context for `domain`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the host refuses.
    fn create_security_context(
        &self,
        domain: &str,
    ) -> Result<SecurityContext, Report<ConfigurationError>>;

    /// Makes `security_context` current for the request.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the host refuses.
    fn install_security_context(
        &self,
        request: &mut RequestContext,
        security_context: SecurityContext,
    ) -> Result<(), Report<ConfigurationError>>;

    /// Returns the request's current security context.
    fn current_security_context<'a>(
        &self,
        request: &'a RequestContext,
    ) -> Option<&'a SecurityContext> {
        request.security_context()
    }
}

/// Performs every operation directly, for hosts without a privilege model.
#[derive(Debug, Clone)]
pub struct DirectContextAccess {
    loader: ContextLoader,
}

impl DirectContextAccess {
    /// Default security domain name.
    pub const DEFAULT_DOMAIN: &'static str = "openid";

    #[must_use]
    pub fn new(security_domain: impl Into<String>) -> Self {
        Self {
            loader: ContextLoader::new(security_domain),
        }
    }
}

impl Default for DirectContextAccess {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DOMAIN)
    }
}

impl PrivilegedContextAccess for DirectContextAccess {
    fn context_loader(&self) -> Result<ContextLoader, Report<ConfigurationError>> {
        Ok(self.loader.clone())
    }

    fn create_security_context(
        &self,
        domain: &str,
    ) -> Result<SecurityContext, Report<ConfigurationError>> {
        if domain.trim().is_empty() {
            return Err(ConfigurationError::SecurityContext {
                reason: "security domain is empty".to_string(),
            }
            .into());
        }
        Ok(SecurityContext::new(domain))
    }

    fn install_security_context(
        &self,
        request: &mut RequestContext,
        security_context: SecurityContext,
    ) -> Result<(), Report<ConfigurationError>> {
        request.set_security_context(security_context);
        Ok(())
    }
}
