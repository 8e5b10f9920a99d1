//! Gate middleware and identity extractors for Axum.
//!
//! The middleware wraps the whole router: the gate may rewrite the request
//! target when it restores a saved request, and that must happen before
//! routing.

use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use openid_gate::{GateRequest, GateResponse, RequestContext};
use openid_gate_core::SessionId;
use openid_gate_identity::Principal;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::AppState;

/// Paths served without running the gate.
pub const PUBLIC_PATHS: &[&str] = &["/healthz", "/auth/logout"];

/// Runs every non-public request through the authentication gate.
pub async fn gate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let existing = jar
        .get(&state.http.session_cookie)
        .and_then(|cookie| cookie.value().parse::<SessionId>().ok());
    let session = existing.unwrap_or_default();

    let (mut parts, body) = request.into_parts();
    let body = match to_bytes(body, state.http.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "request body rejected");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let mut gate_request = GateRequest::new(
        session,
        parts.method.clone(),
        parts.uri.clone(),
        parts.headers.clone(),
        body,
    );
    let mut ctx = RequestContext::new();
    let mut gate_response = GateResponse::new();

    let response = match state
        .gate
        .handle(&mut ctx, &mut gate_request, &mut gate_response)
        .await
    {
        Ok(true) => {
            let (method, uri, headers, body) = gate_request.into_parts();
            parts.method = method;
            parts.uri = uri;
            parts.headers = headers;
            parts.extensions.insert(ctx);

            let mut response = next.run(Request::from_parts(parts, Body::from(body))).await;
            for value in gate_response.headers().get_all(SET_COOKIE) {
                response.headers_mut().append(SET_COOKIE, value.clone());
            }
            response
        }
        Ok(false) => gate_response.into_http().into_response(),
        Err(report) => {
            error!(error = %report, "authentication gate failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    };

    if existing.is_some() {
        return response;
    }

    debug!(session = %session, "issuing session cookie");
    let cookie = Cookie::build((state.http.session_cookie.clone(), session.to_string()))
        .path("/")
        .http_only(true)
        .secure(state.http.secure_cookies)
        .same_site(SameSite::Lax);
    (jar.add(cookie), response).into_response()
}

/// Extractor for requiring an authenticated principal.
///
/// Only succeeds behind the `gate` middleware.
pub struct RequireIdentity(pub Principal);

impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(RequestContext::principal)
            .cloned()
            .map(RequireIdentity)
            .ok_or(IdentityRejection::NotAuthenticated)
    }
}

/// Extractor for optionally getting the authenticated principal.
pub struct OptionalIdentity(pub Option<Principal>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match RequireIdentity::from_request_parts(parts, state).await {
            Ok(RequireIdentity(principal)) => Ok(OptionalIdentity(Some(principal))),
            Err(_) => Ok(OptionalIdentity(None)),
        }
    }
}

/// Rejection type for identity extractors.
#[derive(Debug)]
pub enum IdentityRejection {
    NotAuthenticated,
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => (StatusCode::UNAUTHORIZED, "Not authenticated").into_response(),
        }
    }
}
