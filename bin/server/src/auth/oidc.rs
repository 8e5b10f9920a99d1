//! OpenID Connect verifier built on the openidconnect crate.
//!
//! The pending request (CSRF state, PKCE verifier, nonce) travels in a
//! short-lived `HttpOnly` cookie between the redirect and the callback.

use crate::config::OidcConfig;
use async_trait::async_trait;
use axum::http::HeaderValue;
use axum::http::header::SET_COOKIE;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use openid_gate::{ExternalVerifier, GateRequest, GateResponse, Realm, VerifierSettings};
use openid_gate_identity::{
    AttributeRequest, Attributes, ConfigurationError, IdentityResult, ProtocolError,
};
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use time::Duration as TimeDuration;
use tracing::{debug, info};
use url::Url;

/// Auth state cookie name (for CSRF protection during OIDC flow).
pub const AUTH_STATE_COOKIE: &str = "auth_state";

/// Discovered provider and per-deployment settings.
struct Provider {
    metadata: CoreProviderMetadata,
    redirect_url: RedirectUrl,
    attributes: AttributeRequest,
}

/// Verifier speaking OpenID Connect authorization code flow with PKCE.
pub struct OidcVerifier {
    config: OidcConfig,
    secure_cookies: bool,
    http_client: reqwest::Client,
    provider: OnceLock<Provider>,
}

/// Data needed to complete the OIDC callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub csrf_token: String,
    pub pkce_verifier: String,
    pub nonce: String,
}

impl AuthState {
    /// Encodes the state as a cookie-safe string.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Unavailable` if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let json = serde_json::to_vec(self).map_err(|e| ProtocolError::Unavailable {
            reason: format!("failed to serialize auth state: {e}"),
        })?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decodes a cookie value produced by `encode`.
    #[must_use]
    pub fn decode(value: &str) -> Option<Self> {
        let json = URL_SAFE_NO_PAD.decode(value).ok()?;
        serde_json::from_slice(&json).ok()
    }
}

impl OidcVerifier {
    /// Creates an uninitialized verifier.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the HTTP client cannot be built.
    pub fn new(
        config: OidcConfig,
        secure_cookies: bool,
    ) -> Result<Self, Report<ConfigurationError>> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigurationError::VerifierInitialization {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            config,
            secure_cookies,
            http_client,
            provider: OnceLock::new(),
        })
    }

    fn provider(&self) -> Result<&Provider, ProtocolError> {
        self.provider.get().ok_or_else(|| ProtocolError::Unavailable {
            reason: "verifier is not initialized".to_string(),
        })
    }

    fn state_cookie(&self, value: String, max_age: TimeDuration) -> Result<HeaderValue, ProtocolError> {
        let cookie = Cookie::build((AUTH_STATE_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .build();
        HeaderValue::from_str(&cookie.to_string()).map_err(|e| ProtocolError::Unavailable {
            reason: format!("invalid auth state cookie: {e}"),
        })
    }
}

#[async_trait]
impl ExternalVerifier for OidcVerifier {
    fn is_initialized(&self) -> bool {
        self.provider.get().is_some()
    }

    async fn initialize(
        &self,
        settings: &VerifierSettings,
    ) -> Result<(), Report<ConfigurationError>> {
        if self.is_initialized() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }

        let issuer_url = IssuerUrl::new(self.config.issuer_url.clone()).map_err(|e| {
            ConfigurationError::VerifierInitialization {
                reason: format!("invalid issuer URL: {e}"),
            }
        })?;

        let metadata = CoreProviderMetadata::discover_async(issuer_url, &self.http_client)
            .await
            .map_err(|e| ConfigurationError::VerifierInitialization {
                reason: format!("failed to discover provider: {e}"),
            })?;

        let redirect = settings
            .return_url
            .as_ref()
            .map(Url::to_string)
            .or_else(|| self.config.redirect_uri.clone())
            .ok_or_else(|| ConfigurationError::VerifierInitialization {
                reason: "no return URL or redirect URI configured".to_string(),
            })?;
        let redirect_url =
            RedirectUrl::new(redirect).map_err(|e| ConfigurationError::VerifierInitialization {
                reason: format!("invalid redirect URI: {e}"),
            })?;

        self.provider
            .set(Provider {
                metadata,
                redirect_url,
                attributes: settings.attributes.clone(),
            })
            .map_err(|_| ConfigurationError::AlreadyInitialized)?;

        info!(issuer = %self.config.issuer_url, "OIDC provider discovered");
        Ok(())
    }

    async fn prepare_and_send_auth_request(
        &self,
        _request: &GateRequest,
        response: &mut GateResponse,
    ) -> Result<bool, Report<ProtocolError>> {
        let provider = self.provider()?;
        let client = CoreClient::from_provider_metadata(
            provider.metadata.clone(),
            ClientId::new(self.config.client_id.clone()),
            Some(ClientSecret::new(self.config.client_secret.clone())),
        )
        .set_redirect_uri(provider.redirect_url.clone());

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);

        for scope in self.config.scopes() {
            auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
        }

        let (auth_url, csrf_token, nonce) = auth_request.url();

        let state = AuthState {
            csrf_token: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
            nonce: nonce.secret().clone(),
        };
        let cookie = self.state_cookie(state.encode()?, TimeDuration::minutes(10))?;
        response.append_header(SET_COOKIE, cookie);
        response
            .send_redirect(auth_url.as_str())
            .map_err(|e| ProtocolError::Unavailable {
                reason: format!("invalid authorization URL: {e}"),
            })?;

        debug!("redirecting to OIDC provider");
        Ok(true)
    }

    async fn process_incoming_auth_result(
        &self,
        request: &GateRequest,
        response: &mut GateResponse,
        realm: &dyn Realm,
    ) -> Result<Option<IdentityResult>, Report<ProtocolError>> {
        // The pending state is single-use whatever the outcome.
        response.append_header(SET_COOKIE, self.state_cookie(String::new(), TimeDuration::ZERO)?);

        if let Some(error) = request.query_param("error") {
            return Err(ProtocolError::ProviderDenied {
                error,
                description: request.query_param("error_description"),
            }
            .into());
        }

        let pending = request
            .cookie(AUTH_STATE_COOKIE)
            .and_then(AuthState::decode)
            .ok_or(ProtocolError::NoPendingRequest)?;

        let returned_state =
            request
                .query_param("state")
                .ok_or_else(|| ProtocolError::MissingParameter {
                    name: "state".to_string(),
                })?;
        if returned_state != pending.csrf_token {
            return Err(ProtocolError::StateMismatch.into());
        }

        let code = request
            .query_param("code")
            .ok_or_else(|| ProtocolError::MissingParameter {
                name: "code".to_string(),
            })?;

        let provider = self.provider()?;
        let client = CoreClient::from_provider_metadata(
            provider.metadata.clone(),
            ClientId::new(self.config.client_id.clone()),
            Some(ClientSecret::new(self.config.client_secret.clone())),
        )
        .set_redirect_uri(provider.redirect_url.clone());

        let token_request =
            client
                .exchange_code(AuthorizationCode::new(code))
                .map_err(|e| ProtocolError::TokenExchange {
                    reason: format!("token endpoint error: {e}"),
                })?;

        let token_response = token_request
            .set_pkce_verifier(PkceCodeVerifier::new(pending.pkce_verifier))
            .request_async(&self.http_client)
            .await
            .map_err(|e| ProtocolError::TokenExchange {
                reason: e.to_string(),
            })?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| ProtocolError::TokenExchange {
                reason: "no ID token in response".to_string(),
            })?;

        let nonce = Nonce::new(pending.nonce);
        let claims = id_token
            .claims(&client.id_token_verifier(), &nonce)
            .map_err(|e| ProtocolError::TokenValidation {
                reason: e.to_string(),
            })?;

        let subject = claims.subject().to_string();
        let issuer =
            Url::parse(&claims.issuer().to_string()).map_err(|e| ProtocolError::TokenValidation {
                reason: format!("invalid issuer: {e}"),
            })?;

        // Custom claims are not exposed by the typed claims; read the
        // verified token's payload directly.
        let payload = id_token_payload(&token_response)?;
        let attributes = lift_attributes(&payload, &provider.attributes)?;

        let identity = IdentityResult::new(subject, issuer, attributes).map_err(|e| {
            ProtocolError::TokenValidation {
                reason: e.to_string(),
            }
        })?;

        if !realm.admits(&identity) {
            info!(subject = identity.identifier(), "realm refused identity");
            return Ok(None);
        }

        debug!(subject = identity.identifier(), "ID token verified");
        Ok(Some(identity))
    }
}

/// Extracts the raw ID token payload from a token response.
fn id_token_payload<TR>(token_response: &TR) -> Result<Value, ProtocolError>
where
    TR: Serialize,
{
    let response_json =
        serde_json::to_value(token_response).map_err(|e| ProtocolError::TokenValidation {
            reason: format!("failed to serialize token response: {e}"),
        })?;

    let id_token = response_json
        .get("id_token")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::TokenValidation {
            reason: "no id_token in response".to_string(),
        })?;

    decode_jwt_payload(id_token)
}

/// Decodes the payload segment of a compact JWT.
pub(crate) fn decode_jwt_payload(token: &str) -> Result<Value, ProtocolError> {
    // JWT is base64url(header).base64url(payload).signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(ProtocolError::TokenValidation {
            reason: "invalid JWT format".to_string(),
        });
    }

    let payload_bytes =
        URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|e| ProtocolError::TokenValidation {
                reason: format!("failed to decode JWT payload: {e}"),
            })?;

    serde_json::from_slice(&payload_bytes).map_err(|e| ProtocolError::TokenValidation {
        reason: format!("failed to parse JWT payload: {e}"),
    })
}

/// Lifts the requested claims into an attribute bag.
///
/// String claims become one value, arrays keep their scalar members, and
/// booleans and numbers are rendered as text.
pub(crate) fn lift_attributes(
    payload: &Value,
    request: &AttributeRequest,
) -> Result<Attributes, ProtocolError> {
    let mut attributes = Attributes::new();
    for name in request.all() {
        let values = payload.get(name).map(claim_values).unwrap_or_default();
        if values.is_empty() {
            if request.required().iter().any(|required| required == name) {
                return Err(ProtocolError::MissingAttribute {
                    name: name.to_string(),
                });
            }
            continue;
        }
        attributes.insert(name.to_string(), values);
    }
    Ok(attributes)
}

fn claim_values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar).collect(),
        other => scalar(other).into_iter().collect(),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
