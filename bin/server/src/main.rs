use chrono::Duration;
use openid_gate::{AuthenticationGate, InMemorySessionStore};
use openid_gate_server::{
    StartupError, app,
    auth::{AppState, OidcVerifier},
    config::ServerConfig,
};
use rootcause::prelude::Report;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!(error = %report, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Report<StartupError>> {
    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| StartupError::Config {
        reason: e.to_string(),
    })?;
    let prepared = config.gate.prepare().map_err(|e| StartupError::Gate {
        reason: e.to_string(),
    })?;
    tracing::info!(roles = ?prepared.roles.roles(), "Loaded configuration");

    let sessions = Arc::new(InMemorySessionStore::new(Duration::minutes(
        config.server.session_idle_minutes,
    )));

    // Spawn periodic session cleanup task
    let cleanup_sessions = Arc::clone(&sessions);
    let cleanup_interval_secs = config.server.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match cleanup_sessions.purge_expired() {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    // Provider discovery happens on the first gated request
    let verifier = OidcVerifier::new(config.oidc, config.server.secure_cookies).map_err(|e| {
        StartupError::Verifier {
            reason: e.to_string(),
        }
    })?;

    let gate = AuthenticationGate::builder(prepared, Arc::new(verifier), sessions.clone())
        .registry(sessions.clone())
        .build();

    let addr = config.server.bind_address.clone();
    let app_state = Arc::new(AppState::new(gate, sessions, config.server));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StartupError::Bind {
            address: addr.clone(),
            reason: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve {
            reason: e.to_string(),
        })?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
