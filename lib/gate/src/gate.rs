//! The authentication gate.
//!
//! [`AuthenticationGate::handle`] runs once per request, before the host
//! dispatches it. It either lets the request proceed with an identity
//! attached to the [`RequestContext`], or commits a response (a redirect
//! to the provider or an error) and tells the host to stop.

use crate::context::{DirectContextAccess, PrivilegedContextAccess, RequestContext};
use crate::error::{GateError, SessionStoreError};
use crate::flow::{FlowEvent, FlowState, STATE_ATTRIBUTE, StoredState};
use crate::request::{GateRequest, GateResponse};
use crate::registration::{
    NoopRegistry, PASSWORD_NOTE, PrincipalRegistry, Registrar, RegistrationStrategy, USERNAME_NOTE,
};
use crate::session::SessionStore;
use crate::snapshot::RequestSnapshots;
use crate::verifier::{ExternalVerifier, Realm, StaticRealm, VerifierSettings};
use http::{StatusCode, Uri};
use openid_gate_core::SessionId;
use openid_gate_identity::{
    ConfigurationError, IntegrityError, PreparedConfig, Principal, ProtocolError,
};
use rootcause::prelude::Report;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, trace, warn};

/// Body of every response for a failed authentication.
pub const AUTHENTICATION_FAILED: &str = "Authentication failed";

/// Flow state as read from the session, with the raw value kept for
/// compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Observed {
    raw: Option<String>,
    state: StoredState,
}

impl Observed {
    fn new(raw: Option<String>) -> Self {
        let state = StoredState::from_attribute(raw.as_deref());
        Self { raw, state }
    }

    fn is(&self, state: FlowState) -> bool {
        self.state.known() == Some(state)
    }
}

/// Outcome of a flow transition attempt.
#[derive(Debug)]
enum Advance {
    /// The swap happened.
    Moved(Observed),
    /// Another request changed the state first; carries what it wrote.
    Lost(Observed),
    /// The event is not allowed from the observed state.
    Refused,
}

fn store_failure(session: SessionId) -> impl FnOnce(Report<SessionStoreError>) -> GateError {
    move |report| GateError::SessionStore {
        session,
        reason: report.to_string(),
    }
}

fn misconfigured(report: Report<ConfigurationError>) -> GateError {
    GateError::Configuration {
        reason: report.to_string(),
    }
}

/// Gatekeeper in front of protected resources.
pub struct AuthenticationGate {
    config: PreparedConfig,
    verifier: Arc<dyn ExternalVerifier>,
    realm: Arc<dyn Realm>,
    sessions: Arc<dyn SessionStore>,
    snapshots: RequestSnapshots,
    registrar: Registrar,
    context_access: Arc<dyn PrivilegedContextAccess>,
    initialization: OnceCell<Result<(), GateError>>,
}

impl AuthenticationGate {
    /// Creates a builder.
    #[must_use]
    pub fn builder(
        config: PreparedConfig,
        verifier: Arc<dyn ExternalVerifier>,
        sessions: Arc<dyn SessionStore>,
    ) -> AuthenticationGateBuilder {
        AuthenticationGateBuilder {
            config,
            verifier,
            sessions,
            realm: None,
            registry: None,
            context_access: None,
        }
    }

    /// Returns the prepared configuration.
    #[must_use]
    pub fn config(&self) -> &PreparedConfig {
        &self.config
    }

    /// Returns the session store.
    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Returns the realm.
    #[must_use]
    pub fn realm(&self) -> &Arc<dyn Realm> {
        &self.realm
    }

    /// Returns true once verifier initialization has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        matches!(self.initialization.get(), Some(Ok(())))
    }

    /// Returns the detected registration call shape, once known.
    #[must_use]
    pub fn registration_strategy(&self) -> Option<RegistrationStrategy> {
        self.registrar.strategy()
    }

    /// Decides whether `request` may proceed.
    ///
    /// Returns `Ok(true)` when the request should be dispatched; `request`
    /// may have been rewritten to the saved original. Returns `Ok(false)`
    /// when `response` has been committed and must be sent instead.
    ///
    /// # Errors
    ///
    /// Returns a `GateError` on configuration failures, when the verifier
    /// and realm disagree, when a finished session has lost its principal,
    /// or when the session store fails. The host should answer with a
    /// server error.
    #[instrument(
        skip_all,
        fields(session = %request.session(), method = %request.method(), uri = %request.uri())
    )]
    pub async fn handle(
        &self,
        ctx: &mut RequestContext,
        request: &mut GateRequest,
        response: &mut GateResponse,
    ) -> Result<bool, Report<GateError>> {
        if let Some(principal) = ctx.principal() {
            trace!(principal = principal.name(), "identity already present");
            return Ok(true);
        }

        let session = request.session();
        let mut observed = self.observe(session).await?;
        if observed.is(FlowState::Finished) {
            self.reattach(ctx, session).await?;
            return Ok(true);
        }

        self.ensure_initialized().await?;

        if observed.raw.is_none() {
            observed = match self.advance(session, &observed, FlowEvent::NoIdentityYet).await? {
                Advance::Moved(current) | Advance::Lost(current) => current,
                Advance::Refused => observed,
            };
        }

        match &observed.state {
            StoredState::Known(FlowState::Finished) => {
                self.reattach(ctx, session).await?;
                Ok(true)
            }
            StoredState::Known(FlowState::Empty) => {
                self.send_to_provider(&observed, request, response).await
            }
            StoredState::Known(FlowState::AwaitingProvider) => {
                self.complete(&observed, ctx, request, response).await
            }
            StoredState::Unrecognized(value) => {
                warn!(value = %value, "unrecognized flow state");
                response.send_error(StatusCode::FORBIDDEN, "Access denied");
                Ok(false)
            }
        }
    }

    async fn ensure_initialized(&self) -> Result<(), Report<GateError>> {
        let outcome = self
            .initialization
            .get_or_init(|| async {
                if self.verifier.is_initialized() {
                    return Ok(());
                }
                let settings = VerifierSettings {
                    return_url: self.config.return_url.clone(),
                    attributes: self.config.attributes.clone(),
                    roles: self.config.roles.clone(),
                };
                match self.verifier.initialize(&settings).await {
                    Ok(()) => {
                        info!("verifier initialized");
                        Ok(())
                    }
                    Err(report) => {
                        error!(error = %report, "verifier initialization failed");
                        Err(misconfigured(report))
                    }
                }
            })
            .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(err) => Err(err.clone().into()),
        }
    }

    async fn observe(&self, session: SessionId) -> Result<Observed, Report<GateError>> {
        let raw = self
            .sessions
            .attribute(session, STATE_ATTRIBUTE)
            .await
            .map_err(store_failure(session))?;
        Ok(Observed::new(raw))
    }

    async fn advance(
        &self,
        session: SessionId,
        observed: &Observed,
        event: FlowEvent,
    ) -> Result<Advance, Report<GateError>> {
        let Some(to) = observed.state.known().and_then(|from| from.next(event)) else {
            warn!(state = ?observed.state, ?event, "flow transition refused");
            return Ok(Advance::Refused);
        };

        let swapped = self
            .sessions
            .replace_attribute(
                session,
                STATE_ATTRIBUTE,
                observed.raw.as_deref(),
                Some(to.as_str().to_string()),
            )
            .await
            .map_err(store_failure(session))?;

        if swapped {
            trace!(state = %to, ?event, "flow advanced");
            Ok(Advance::Moved(Observed::new(Some(to.as_str().to_string()))))
        } else {
            let current = self.observe(session).await?;
            debug!(state = ?current.state, ?event, "flow changed concurrently");
            Ok(Advance::Lost(current))
        }
    }

    /// EMPTY: save the request and send the browser to the provider.
    async fn send_to_provider(
        &self,
        observed: &Observed,
        request: &GateRequest,
        response: &mut GateResponse,
    ) -> Result<bool, Report<GateError>> {
        let session = request.session();
        if self.config.save_restore_request {
            self.snapshots
                .save(request)
                .await
                .map_err(store_failure(session))?;
        }

        let sent = match self
            .verifier
            .prepare_and_send_auth_request(request, response)
            .await
        {
            Ok(sent) => sent,
            Err(report) => {
                warn!(error = %report, "could not build authentication request");
                response.send_error(StatusCode::UNAUTHORIZED, AUTHENTICATION_FAILED);
                false
            }
        };

        if !sent {
            self.snapshots
                .discard(session)
                .await
                .map_err(store_failure(session))?;
            if !response.is_committed() {
                response.send_error(StatusCode::UNAUTHORIZED, AUTHENTICATION_FAILED);
            }
            return Ok(false);
        }

        match self
            .advance(session, observed, FlowEvent::ProviderRequestSent)
            .await?
        {
            Advance::Moved(_) => debug!("sent to provider"),
            Advance::Lost(current) if current.is(FlowState::Finished) => {
                self.snapshots
                    .discard(session)
                    .await
                    .map_err(store_failure(session))?;
            }
            Advance::Lost(_) | Advance::Refused => {}
        }
        Ok(false)
    }

    /// AWAITING_PROVIDER: verify the callback and establish the identity.
    async fn complete(
        &self,
        observed: &Observed,
        ctx: &mut RequestContext,
        request: &mut GateRequest,
        response: &mut GateResponse,
    ) -> Result<bool, Report<GateError>> {
        let session = request.session();
        let outcome = self
            .verifier
            .process_incoming_auth_result(request, response, self.realm.as_ref())
            .await;

        let identity = match outcome {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                error!("callback verified without an identity");
                return Err(GateError::Integrity {
                    session,
                    reason: IntegrityError::MissingIdentity.to_string(),
                }
                .into());
            }
            Err(report) => return self.reject(observed, ctx, session, response, &report).await,
        };

        // The principal is in the session before FINISHED is visible.
        let principal = Principal::new(identity, self.config.roles.clone());
        self.attach_to_session(session, &principal).await?;

        match self
            .advance(session, observed, FlowEvent::CallbackProcessed)
            .await?
        {
            Advance::Moved(_) => {}
            Advance::Lost(current) if current.is(FlowState::Finished) => {
                debug!("flow finished by a concurrent callback");
                self.reattach(ctx, session).await?;
                return Ok(true);
            }
            Advance::Lost(_) | Advance::Refused => {
                warn!("flow reset while the callback was processed");
                response.send_error(StatusCode::UNAUTHORIZED, AUTHENTICATION_FAILED);
                return Ok(false);
            }
        }

        self.install(ctx, principal.clone())?;
        self.restore_or_land(session, request).await?;
        self.registrar
            .register(session, response, &principal)
            .await
            .map_err(misconfigured)?;

        info!(principal = principal.name(), "identity established");
        Ok(true)
    }

    async fn reject(
        &self,
        observed: &Observed,
        ctx: &mut RequestContext,
        session: SessionId,
        response: &mut GateResponse,
        report: &Report<ProtocolError>,
    ) -> Result<bool, Report<GateError>> {
        warn!(error = %report, "provider callback rejected");

        match self
            .advance(session, observed, FlowEvent::CallbackRejected)
            .await?
        {
            Advance::Moved(_) => {
                self.snapshots
                    .discard(session)
                    .await
                    .map_err(store_failure(session))?;
            }
            Advance::Lost(current) if current.is(FlowState::Finished) => {
                debug!("flow finished by a concurrent callback");
                self.reattach(ctx, session).await?;
                return Ok(true);
            }
            Advance::Lost(_) | Advance::Refused => {}
        }

        response.send_error(StatusCode::UNAUTHORIZED, AUTHENTICATION_FAILED);
        Ok(false)
    }

    /// FINISHED: put the session's principal back on the request.
    async fn reattach(
        &self,
        ctx: &mut RequestContext,
        session: SessionId,
    ) -> Result<(), Report<GateError>> {
        let principal = self
            .sessions
            .principal(session)
            .await
            .map_err(store_failure(session))?;
        match principal {
            Some(principal) => {
                trace!(principal = principal.name(), "identity reattached");
                self.install(ctx, principal)
            }
            None => {
                error!("flow finished but no principal is attached");
                Err(GateError::Integrity {
                    session,
                    reason: IntegrityError::MissingPrincipal.to_string(),
                }
                .into())
            }
        }
    }

    fn install(&self, ctx: &mut RequestContext, principal: Principal) -> Result<(), Report<GateError>> {
        let access = self.context_access.as_ref();
        let loader = access.context_loader().map_err(misconfigured)?;
        let mut security_context = access
            .create_security_context(loader.security_domain())
            .map_err(misconfigured)?;
        security_context.set_principal(principal.clone());
        access
            .install_security_context(ctx, security_context)
            .map_err(misconfigured)?;
        ctx.attach(principal);
        Ok(())
    }

    async fn attach_to_session(
        &self,
        session: SessionId,
        principal: &Principal,
    ) -> Result<(), Report<GateError>> {
        self.sessions
            .set_note(session, USERNAME_NOTE, principal.name().to_string())
            .await
            .map_err(store_failure(session))?;
        self.sessions
            .set_note(session, PASSWORD_NOTE, String::new())
            .await
            .map_err(store_failure(session))?;
        self.sessions
            .set_principal(session, principal.clone())
            .await
            .map_err(store_failure(session))?;
        Ok(())
    }

    async fn restore_or_land(
        &self,
        session: SessionId,
        request: &mut GateRequest,
    ) -> Result<(), Report<GateError>> {
        if self.config.save_restore_request {
            let saved = self
                .snapshots
                .current(session)
                .await
                .map_err(store_failure(session))?;
            if let Some(id) = saved {
                let restored = self
                    .snapshots
                    .restore(session, id, request)
                    .await
                    .map_err(store_failure(session))?;
                if restored {
                    return Ok(());
                }
            }
        }

        let landing: Uri =
            self.config
                .landing_page
                .parse()
                .map_err(|e: http::uri::InvalidUri| GateError::Configuration {
                    reason: format!("landing page '{}': {e}", self.config.landing_page),
                })?;
        debug!(landing = %landing, "no saved request, forwarding to landing page");
        request.forward_to(landing);
        Ok(())
    }
}

/// Builder for `AuthenticationGate`.
pub struct AuthenticationGateBuilder {
    config: PreparedConfig,
    verifier: Arc<dyn ExternalVerifier>,
    sessions: Arc<dyn SessionStore>,
    realm: Option<Arc<dyn Realm>>,
    registry: Option<Arc<dyn PrincipalRegistry>>,
    context_access: Option<Arc<dyn PrivilegedContextAccess>>,
}

impl AuthenticationGateBuilder {
    /// Sets the realm. Default: a `StaticRealm` admitting every identity.
    #[must_use]
    pub fn realm(mut self, realm: Arc<dyn Realm>) -> Self {
        self.realm = Some(realm);
        self
    }

    /// Sets the host principal registry. Default: `NoopRegistry`.
    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn PrincipalRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the security context hooks. Default: `DirectContextAccess`.
    #[must_use]
    pub fn context_access(mut self, access: Arc<dyn PrivilegedContextAccess>) -> Self {
        self.context_access = Some(access);
        self
    }

    /// Builds the gate.
    #[must_use]
    pub fn build(self) -> AuthenticationGate {
        let snapshots =
            RequestSnapshots::new(Arc::clone(&self.sessions), self.config.max_saved_body_bytes);
        AuthenticationGate {
            snapshots,
            verifier: self.verifier,
            realm: self.realm.unwrap_or_else(|| Arc::new(StaticRealm::new())),
            sessions: self.sessions,
            registrar: Registrar::new(self.registry.unwrap_or_else(|| Arc::new(NoopRegistry))),
            context_access: self
                .context_access
                .unwrap_or_else(|| Arc::new(DirectContextAccess::default())),
            initialization: OnceCell::new(),
            config: self.config,
        }
    }
}
