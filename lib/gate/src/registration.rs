//! Registering an established principal with the host.
//!
//! Hosts expose one of two call shapes. The primary shape takes a
//! [`Registration`] with an empty password. Older hosts only offer the
//! legacy shape, which also receives the response and expects the
//! [`LEGACY_PASSWORD`] placeholder. The [`Registrar`] probes the primary
//! shape once and remembers which one works for the life of the process.

use crate::error::SessionStoreError;
use crate::request::GateResponse;
use crate::session::{InMemorySessionStore, SessionStore};
use async_trait::async_trait;
use openid_gate_core::SessionId;
use openid_gate_identity::{ConfigurationError, Principal, RegistrationError};
use rootcause::prelude::Report;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, warn};

/// Session note holding the principal name.
pub const USERNAME_NOTE: &str = "SESS_USERNAME";
/// Session note holding the (empty) password.
pub const PASSWORD_NOTE: &str = "SESS_PASSWORD";
/// Session note holding the authentication method.
pub const AUTH_TYPE_NOTE: &str = "AUTH_TYPE";
/// Password passed to the legacy registration call.
pub const LEGACY_PASSWORD: &str = "EMPTY";

/// Arguments of the primary registration call.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'a> {
    pub session: SessionId,
    pub principal: &'a Principal,
    pub auth_method: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

/// Host bookkeeping for authenticated principals.
#[async_trait]
pub trait PrincipalRegistry: Send + Sync {
    /// Primary registration call.
    ///
    /// # Errors
    ///
    /// `RegistrationError::Unsupported` if the host lacks this call shape.
    async fn register(&self, registration: Registration<'_>) -> Result<(), RegistrationError>;

    /// Legacy registration call.
    ///
    /// # Errors
    ///
    /// `RegistrationError::Unsupported` unless the host overrides it.
    async fn register_legacy(
        &self,
        _session: SessionId,
        _response: &mut GateResponse,
        _principal: &Principal,
        _auth_method: &str,
        _username: &str,
        _password: &str,
    ) -> Result<(), RegistrationError> {
        Err(RegistrationError::Unsupported)
    }
}

/// Which registration call shape the host supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStrategy {
    Primary,
    Fallback,
}

/// Registers principals, remembering the working call shape.
pub struct Registrar {
    registry: Arc<dyn PrincipalRegistry>,
    strategy: OnceLock<RegistrationStrategy>,
}

impl Registrar {
    #[must_use]
    pub fn new(registry: Arc<dyn PrincipalRegistry>) -> Self {
        Self {
            registry,
            strategy: OnceLock::new(),
        }
    }

    /// Returns the detected strategy, once known.
    #[must_use]
    pub fn strategy(&self) -> Option<RegistrationStrategy> {
        self.strategy.get().copied()
    }

    /// Registers `principal` for `session`.
    ///
    /// Failures other than a missing call shape are logged and swallowed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::RegistrationUnavailable` if neither
    /// call shape is supported.
    pub async fn register(
        &self,
        session: SessionId,
        response: &mut GateResponse,
        principal: &Principal,
    ) -> Result<(), Report<ConfigurationError>> {
        if self.strategy() == Some(RegistrationStrategy::Fallback) {
            return self.register_fallback(session, response, principal).await;
        }

        let registration = Registration {
            session,
            principal,
            auth_method: principal.auth_method(),
            username: principal.name(),
            password: "",
        };
        match self.registry.register(registration).await {
            Ok(()) => {
                let _ = self.strategy.set(RegistrationStrategy::Primary);
                debug!(%session, principal = principal.name(), "principal registered");
                Ok(())
            }
            Err(RegistrationError::Unsupported) if self.strategy().is_none() => {
                warn!("primary registration unsupported, using legacy call");
                let _ = self.strategy.set(RegistrationStrategy::Fallback);
                self.register_fallback(session, response, principal).await
            }
            Err(err) => {
                let _ = self.strategy.set(RegistrationStrategy::Primary);
                error!(%session, error = %err, "principal registration failed");
                Ok(())
            }
        }
    }

    async fn register_fallback(
        &self,
        session: SessionId,
        response: &mut GateResponse,
        principal: &Principal,
    ) -> Result<(), Report<ConfigurationError>> {
        let result = self
            .registry
            .register_legacy(
                session,
                response,
                principal,
                principal.auth_method(),
                principal.name(),
                LEGACY_PASSWORD,
            )
            .await;
        match result {
            Ok(()) => {
                debug!(%session, principal = principal.name(), "principal registered (legacy)");
                Ok(())
            }
            Err(RegistrationError::Unsupported) => {
                Err(ConfigurationError::RegistrationUnavailable.into())
            }
            Err(err) => {
                error!(%session, error = %err, "legacy principal registration failed");
                Ok(())
            }
        }
    }
}

/// Accepts every registration without recording anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistry;

#[async_trait]
impl PrincipalRegistry for NoopRegistry {
    async fn register(&self, registration: Registration<'_>) -> Result<(), RegistrationError> {
        debug!(principal = registration.username, "registration ignored");
        Ok(())
    }
}

#[async_trait]
impl PrincipalRegistry for InMemorySessionStore {
    async fn register(&self, registration: Registration<'_>) -> Result<(), RegistrationError> {
        let failed = |report: Report<SessionStoreError>| RegistrationError::Failed {
            reason: report.to_string(),
        };
        self.set_principal(registration.session, registration.principal.clone())
            .await
            .map_err(failed)?;
        self.set_note(
            registration.session,
            AUTH_TYPE_NOTE,
            registration.auth_method.to_string(),
        )
        .await
        .map_err(failed)
    }
}
