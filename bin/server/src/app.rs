//! Router assembly and application handlers.

use axum::{Json, Router, middleware::from_fn_with_state, routing::get};
use chrono::{DateTime, Utc};
use openid_gate_identity::Attributes;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState, OptionalIdentity, RequireIdentity};

/// Builds the application.
///
/// Routing happens in a fallback service behind the gate, so a request the
/// gate restores is routed by its original target.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback_service(routes(Arc::clone(&state)))
        .layer(from_fn_with_state(state, auth::gate))
        .layer(TraceLayer::new_for_http())
}

fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/whoami", get(whoami))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", get(auth::logout))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn index(OptionalIdentity(principal): OptionalIdentity) -> String {
    match principal {
        Some(principal) => format!("Hello, {}", principal.name()),
        None => "Hello, anonymous".to_string(),
    }
}

/// The established principal as JSON.
#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub name: String,
    pub provider: String,
    pub auth_method: String,
    pub roles: Vec<String>,
    pub attributes: Attributes,
    pub established_at: DateTime<Utc>,
}

async fn whoami(RequireIdentity(principal): RequireIdentity) -> Json<WhoAmI> {
    Json(WhoAmI {
        name: principal.name().to_string(),
        provider: principal.identity().provider_url().to_string(),
        auth_method: principal.auth_method().to_string(),
        roles: principal.roles().roles().to_vec(),
        attributes: principal.identity().attributes().clone(),
        established_at: principal.established_at(),
    })
}
