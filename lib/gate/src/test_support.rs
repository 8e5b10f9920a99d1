//! Test doubles shared by the gate's unit tests.

use crate::request::{GateRequest, GateResponse};
use crate::registration::{PrincipalRegistry, Registration};
use crate::verifier::{ExternalVerifier, Realm, VerifierSettings};
use async_trait::async_trait;
use openid_gate_core::SessionId;
use openid_gate_identity::{
    Attributes, ConfigurationError, IdentityResult, Principal, ProtocolError, RegistrationError,
    RoleSet,
};
use rootcause::prelude::Report;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

pub(crate) const PROVIDER_AUTH_URL: &str = "https://idp.example/auth?state=test";

pub(crate) fn identity(name: &str) -> IdentityResult {
    let mut attributes = Attributes::new();
    attributes.insert(
        "email".to_string(),
        vec![format!("{name}@example.com")],
    );
    IdentityResult::new(
        name,
        Url::parse("https://idp.example/").expect("valid url"),
        attributes,
    )
    .expect("valid identity")
}

pub(crate) fn principal(name: &str) -> Principal {
    Principal::new(identity(name), RoleSet::from_names(["user"]))
}

/// Verifier whose callback outcome is chosen by the callback URL.
///
/// `?outcome=ok&user=NAME` verifies as NAME, `?outcome=none` verifies
/// without an identity, `?outcome=deny` fails as a provider denial, and
/// anything else fails with a missing parameter.
#[derive(Debug, Default)]
pub(crate) struct ScriptedVerifier {
    initialized: AtomicBool,
    init_failure: Option<ConfigurationError>,
    init_calls: AtomicUsize,
    auth_requests: AtomicUsize,
    callbacks: AtomicUsize,
    settings: Mutex<Option<VerifierSettings>>,
}

impl ScriptedVerifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_init(err: ConfigurationError) -> Self {
        Self {
            init_failure: Some(err),
            ..Self::default()
        }
    }

    pub(crate) fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn auth_requests(&self) -> usize {
        self.auth_requests.load(Ordering::SeqCst)
    }

    pub(crate) fn callbacks(&self) -> usize {
        self.callbacks.load(Ordering::SeqCst)
    }

    pub(crate) fn settings(&self) -> Option<VerifierSettings> {
        self.settings.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ExternalVerifier for ScriptedVerifier {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn initialize(
        &self,
        settings: &VerifierSettings,
    ) -> Result<(), Report<ConfigurationError>> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if let Some(err) = &self.init_failure {
            return Err(err.clone().into());
        }
        *self.settings.lock().expect("lock") = Some(settings.clone());
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn prepare_and_send_auth_request(
        &self,
        _request: &GateRequest,
        response: &mut GateResponse,
    ) -> Result<bool, Report<ProtocolError>> {
        self.auth_requests.fetch_add(1, Ordering::SeqCst);
        response
            .send_redirect(PROVIDER_AUTH_URL)
            .expect("valid location");
        Ok(true)
    }

    async fn process_incoming_auth_result(
        &self,
        request: &GateRequest,
        _response: &mut GateResponse,
        realm: &dyn Realm,
    ) -> Result<Option<IdentityResult>, Report<ProtocolError>> {
        self.callbacks.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        match request.query_param("outcome").as_deref() {
            Some("ok") => {
                let user = request.query_param("user").unwrap_or_else(|| "alice".to_string());
                let identity = identity(&user);
                Ok(realm.admits(&identity).then_some(identity))
            }
            Some("none") => Ok(None),
            Some("deny") => Err(ProtocolError::ProviderDenied {
                error: "access_denied".to_string(),
                description: None,
            }
            .into()),
            _ => Err(ProtocolError::MissingParameter {
                name: "outcome".to_string(),
            }
            .into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegistryMode {
    Primary,
    LegacyOnly,
    Unsupported,
    Failing,
}

/// Registry that supports a chosen call shape and records calls.
#[derive(Debug)]
pub(crate) struct ScriptedRegistry {
    mode: RegistryMode,
    primary_calls: AtomicUsize,
    legacy_calls: AtomicUsize,
    passwords: Mutex<Vec<String>>,
}

impl ScriptedRegistry {
    fn with_mode(mode: RegistryMode) -> Self {
        Self {
            mode,
            primary_calls: AtomicUsize::new(0),
            legacy_calls: AtomicUsize::new(0),
            passwords: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn primary() -> Self {
        Self::with_mode(RegistryMode::Primary)
    }

    pub(crate) fn legacy_only() -> Self {
        Self::with_mode(RegistryMode::LegacyOnly)
    }

    pub(crate) fn unsupported() -> Self {
        Self::with_mode(RegistryMode::Unsupported)
    }

    pub(crate) fn failing() -> Self {
        Self::with_mode(RegistryMode::Failing)
    }

    pub(crate) fn primary_calls(&self) -> usize {
        self.primary_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn legacy_calls(&self) -> usize {
        self.legacy_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn passwords(&self) -> Vec<String> {
        self.passwords.lock().expect("lock").clone()
    }
}

#[async_trait]
impl PrincipalRegistry for ScriptedRegistry {
    async fn register(&self, registration: Registration<'_>) -> Result<(), RegistrationError> {
        self.primary_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            RegistryMode::Primary => {
                self.passwords
                    .lock()
                    .expect("lock")
                    .push(registration.password.to_string());
                Ok(())
            }
            RegistryMode::Failing => Err(RegistrationError::Failed {
                reason: "host rejected principal".to_string(),
            }),
            RegistryMode::LegacyOnly | RegistryMode::Unsupported => {
                Err(RegistrationError::Unsupported)
            }
        }
    }

    async fn register_legacy(
        &self,
        _session: SessionId,
        _response: &mut GateResponse,
        _principal: &Principal,
        _auth_method: &str,
        _username: &str,
        password: &str,
    ) -> Result<(), RegistrationError> {
        self.legacy_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            RegistryMode::LegacyOnly => {
                self.passwords
                    .lock()
                    .expect("lock")
                    .push(password.to_string());
                Ok(())
            }
            _ => Err(RegistrationError::Unsupported),
        }
    }
}
