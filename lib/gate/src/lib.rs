//! Relying-party authentication gate.
//!
//! This crate provides:
//! - The per-request gate that drives the OpenID redirect flow (`AuthenticationGate`)
//! - The per-session flow state machine (`FlowState`, `FlowEvent`)
//! - Saving and replaying the request that triggered a login (`RequestSnapshots`)
//! - The seams a host plugs in: `ExternalVerifier`, `Realm`, `SessionStore`,
//!   `PrincipalRegistry` and `PrivilegedContextAccess`
//!
//! # Example
//!
//! ```no_run
//! use openid_gate::{
//!     AuthenticationGate, ExternalVerifier, GateRequest, GateResponse, InMemorySessionStore,
//!     RequestContext,
//! };
//! use openid_gate_identity::GateConfig;
//! use std::sync::Arc;
//!
//! # async fn example(verifier: Arc<dyn ExternalVerifier>, mut request: GateRequest) {
//! let config = GateConfig::new("user").prepare().expect("valid configuration");
//! let sessions = Arc::new(InMemorySessionStore::default());
//! let gate = AuthenticationGate::builder(config, verifier, sessions.clone())
//!     .registry(sessions)
//!     .build();
//!
//! let mut ctx = RequestContext::new();
//! let mut response = GateResponse::new();
//! if gate.handle(&mut ctx, &mut request, &mut response).await.expect("gate") {
//!     // dispatch `request` with `ctx.principal()` available
//! } else {
//!     // send `response`
//! }
//! # }
//! ```

pub mod context;
pub mod error;
pub mod flow;
pub mod gate;
pub mod registration;
pub mod request;
pub mod session;
pub mod snapshot;
pub mod verifier;

#[cfg(test)]
mod test_support;

// Re-export main types at crate root
pub use context::{
    ContextLoader, DirectContextAccess, PrivilegedContextAccess, RequestContext, SecurityContext,
};
pub use error::{GateError, SessionStoreError};
pub use flow::{FlowEvent, FlowState, STATE_ATTRIBUTE, StoredState};
pub use gate::{AUTHENTICATION_FAILED, AuthenticationGate, AuthenticationGateBuilder};
pub use registration::{
    AUTH_TYPE_NOTE, LEGACY_PASSWORD, NoopRegistry, PASSWORD_NOTE, PrincipalRegistry, Registrar,
    Registration, RegistrationStrategy, USERNAME_NOTE,
};
pub use request::{GateRequest, GateResponse};
pub use session::{InMemorySessionStore, SessionStore};
pub use snapshot::{RequestSnapshot, RequestSnapshots};
pub use verifier::{ExternalVerifier, Realm, StaticRealm, VerifierSettings};
