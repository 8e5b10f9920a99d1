//! Authentication route handlers.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use openid_gate::SessionStore;
use openid_gate_core::SessionId;
use std::sync::Arc;
use time::Duration as TimeDuration;
use tracing::{info, warn};

use super::AppState;

/// Lands a callback the gate let through without a saved request.
///
/// The gate normally replays the original request on the callback; this
/// only answers when it forwarded to the callback path itself.
pub async fn callback(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::to(&state.gate.config().landing_page)
}

/// Drops the session and its cookie.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let session = jar
        .get(&state.http.session_cookie)
        .and_then(|cookie| cookie.value().parse::<SessionId>().ok());

    if let Some(session) = session {
        match state.sessions.invalidate(session).await {
            Ok(()) => info!(session = %session, "session invalidated"),
            Err(report) => warn!(session = %session, error = %report, "failed to invalidate session"),
        }
    }

    let remove_session = Cookie::build((state.http.session_cookie.clone(), ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    (jar.add(remove_session), "Signed out")
}
