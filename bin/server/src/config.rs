//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables, e.g.
//! `GATE__ROLE_STRING=user`, `OIDC__ISSUER_URL=https://idp.example`,
//! `SERVER__BIND_ADDRESS=0.0.0.0:8080`.
//!
//! See [`GateConfig`](openid_gate_identity::GateConfig) for the gate's own
//! settings.

use openid_gate_identity::GateConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Authentication gate configuration.
    pub gate: GateConfig,

    /// OpenID Connect provider configuration.
    pub oidc: OidcConfig,

    /// HTTP and session settings.
    #[serde(default)]
    pub server: HttpConfig,
}

/// OpenID Connect provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    /// Issuer URL used for discovery.
    pub issuer_url: String,
    /// Client identifier registered with the provider.
    pub client_id: String,
    /// Client secret registered with the provider.
    pub client_secret: String,
    /// Callback URL registered with the provider. The gate's `return_url`
    /// takes precedence when both are set.
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Space-separated scopes requested in addition to `openid`.
    /// Default: "email profile"
    #[serde(default = "default_scopes")]
    pub scopes: String,
}

fn default_scopes() -> String {
    "email profile".to_string()
}

impl OidcConfig {
    /// Returns the extra scopes as a list.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.split_whitespace().filter(|s| *s != "openid")
    }
}

/// HTTP and session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Name of the session cookie.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Idle time after which a session is dropped, in minutes.
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Largest request body the server buffers, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_session_cookie() -> String {
    "gate_session".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

fn default_session_idle_minutes() -> i64 {
    30
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            session_cookie: default_session_cookie(),
            secure_cookies: default_secure_cookies(),
            session_idle_minutes: default_session_idle_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()
            .and_then(|config| {
                config.server.validate()?;
                Ok(config)
            })
    }
}

impl HttpConfig {
    /// Rejects values the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup interval or the idle timeout is not
    /// positive.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.cleanup_interval_seconds == 0 {
            return Err(config::ConfigError::Message(
                "server.cleanup_interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.session_idle_minutes <= 0 {
            return Err(config::ConfigError::Message(
                "server.session_idle_minutes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
