//! Authentication module for the openid-gate server.
//!
//! This module provides:
//! - The OpenID Connect verifier the gate drives (`OidcVerifier`)
//! - The Axum middleware that runs every request through the gate
//! - Extractors exposing the established principal to handlers
//!
//! # Session Model
//!
//! The browser carries an opaque session cookie. All flow state, the saved
//! request and the principal live server side in the session store; the
//! only other cookie is the short-lived OIDC state used between the
//! redirect and the callback.

pub mod middleware;
pub mod oidc;
pub mod routes;

use crate::config::HttpConfig;
use openid_gate::{AuthenticationGate, InMemorySessionStore};
use std::sync::Arc;

pub use middleware::{IdentityRejection, OptionalIdentity, PUBLIC_PATHS, RequireIdentity, gate};
pub use oidc::OidcVerifier;
pub use routes::{callback, logout};

/// Shared application state.
pub struct AppState {
    /// The authentication gate guarding every non-public route.
    pub gate: AuthenticationGate,
    /// Session storage shared with the gate.
    pub sessions: Arc<InMemorySessionStore>,
    /// HTTP and session settings.
    pub http: HttpConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(gate: AuthenticationGate, sessions: Arc<InMemorySessionStore>, http: HttpConfig) -> Self {
        Self {
            gate,
            sessions,
            http,
        }
    }
}
