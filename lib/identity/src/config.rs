//! Gate configuration.
//!
//! `GateConfig` is the deployer-facing surface: raw strings as they appear
//! in the environment or a config file. `GateConfig::prepare` validates it
//! once at startup and produces the parsed `PreparedConfig` the gate uses.

use crate::attributes::AttributeRequest;
use crate::error::ConfigurationError;
use crate::role::RoleSet;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for the authentication gate.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Override for the URL the provider redirects back to.
    /// Supports `$VAR`, `${VAR}` and `${VAR:-default}` substitution.
    #[serde(default)]
    return_url: Option<String>,
    /// Comma-separated attributes the provider must release.
    /// Default: "email"
    #[serde(default = "default_required_attributes")]
    required_attributes: String,
    /// Comma-separated attributes the provider may release.
    #[serde(default)]
    optional_attributes: Option<String>,
    /// Whether the original request is saved and replayed after login.
    /// Default: true
    #[serde(default = "default_save_restore_request")]
    save_restore_request: bool,
    /// Comma-separated roles granted to every authenticated identity.
    #[serde(default)]
    role_string: Option<String>,
    /// Resource served after login when no request can be replayed.
    /// Default: "/"
    #[serde(default = "default_landing_page")]
    landing_page: String,
    /// Largest request body captured for replay, in bytes.
    /// Default: 4096
    #[serde(default = "default_max_saved_body_bytes")]
    max_saved_body_bytes: usize,
}

fn default_required_attributes() -> String {
    "email".to_string()
}

fn default_save_restore_request() -> bool {
    true
}

fn default_landing_page() -> String {
    "/".to_string()
}

fn default_max_saved_body_bytes() -> usize {
    4096
}

impl GateConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(role_string: impl Into<String>) -> Self {
        Self {
            return_url: None,
            required_attributes: default_required_attributes(),
            optional_attributes: None,
            save_restore_request: default_save_restore_request(),
            role_string: Some(role_string.into()),
            landing_page: default_landing_page(),
            max_saved_body_bytes: default_max_saved_body_bytes(),
        }
    }

    /// Creates a configuration builder for more customization.
    #[must_use]
    pub fn builder(role_string: impl Into<String>) -> GateConfigBuilder {
        GateConfigBuilder {
            config: Self::new(role_string),
        }
    }

    /// Returns the raw return URL override.
    #[must_use]
    pub fn return_url(&self) -> Option<&str> {
        self.return_url.as_deref()
    }

    /// Returns the raw required attribute list.
    #[must_use]
    pub fn required_attributes(&self) -> &str {
        &self.required_attributes
    }

    /// Returns the raw optional attribute list.
    #[must_use]
    pub fn optional_attributes(&self) -> Option<&str> {
        self.optional_attributes.as_deref()
    }

    /// Returns whether requests are saved and restored.
    #[must_use]
    pub fn save_restore_request(&self) -> bool {
        self.save_restore_request
    }

    /// Returns the raw role string.
    #[must_use]
    pub fn role_string(&self) -> Option<&str> {
        self.role_string.as_deref()
    }

    /// Validates and parses the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for a missing or malformed role string,
    /// a malformed attribute list, or a return URL that does not expand to
    /// an absolute URL.
    pub fn prepare(&self) -> Result<PreparedConfig, ConfigurationError> {
        let roles = RoleSet::parse(self.role_string.as_deref())?;
        let attributes = AttributeRequest::parse(
            &self.required_attributes,
            self.optional_attributes.as_deref(),
        )?;
        let return_url = self
            .return_url
            .as_deref()
            .map(expand_return_url)
            .transpose()?;

        if !self.landing_page.starts_with('/') {
            return Err(ConfigurationError::InvalidLandingPage {
                value: self.landing_page.clone(),
            });
        }

        Ok(PreparedConfig {
            return_url,
            attributes,
            roles,
            save_restore_request: self.save_restore_request,
            landing_page: self.landing_page.clone(),
            max_saved_body_bytes: self.max_saved_body_bytes,
        })
    }
}

fn expand_return_url(raw: &str) -> Result<Url, ConfigurationError> {
    let expanded = shellexpand::env(raw).map_err(|e| ConfigurationError::InvalidReturnUrl {
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    Url::parse(&expanded).map_err(|e| ConfigurationError::InvalidReturnUrl {
        value: expanded.to_string(),
        reason: e.to_string(),
    })
}

/// Builder for `GateConfig`.
#[derive(Debug)]
pub struct GateConfigBuilder {
    config: GateConfig,
}

impl GateConfigBuilder {
    /// Sets the return URL override.
    #[must_use]
    pub fn return_url(mut self, url: impl Into<String>) -> Self {
        self.config.return_url = Some(url.into());
        self
    }

    /// Sets the required attribute list.
    #[must_use]
    pub fn required_attributes(mut self, list: impl Into<String>) -> Self {
        self.config.required_attributes = list.into();
        self
    }

    /// Sets the optional attribute list.
    #[must_use]
    pub fn optional_attributes(mut self, list: impl Into<String>) -> Self {
        self.config.optional_attributes = Some(list.into());
        self
    }

    /// Enables or disables request save and restore.
    #[must_use]
    pub fn save_restore_request(mut self, enabled: bool) -> Self {
        self.config.save_restore_request = enabled;
        self
    }

    /// Sets the landing page.
    #[must_use]
    pub fn landing_page(mut self, path: impl Into<String>) -> Self {
        self.config.landing_page = path.into();
        self
    }

    /// Sets the largest body captured for replay.
    #[must_use]
    pub fn max_saved_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_saved_body_bytes = limit;
        self
    }

    /// Builds the `GateConfig`.
    #[must_use]
    pub fn build(self) -> GateConfig {
        self.config
    }
}

/// Validated gate configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedConfig {
    /// Expanded return URL override.
    pub return_url: Option<Url>,
    /// Attributes requested from the provider.
    pub attributes: AttributeRequest,
    /// Roles granted to every established identity.
    pub roles: RoleSet,
    /// Whether requests are saved and restored.
    pub save_restore_request: bool,
    /// Resource served after login when nothing is replayed.
    pub landing_page: String,
    /// Largest body captured for replay.
    pub max_saved_body_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_has_defaults() {
        let config = GateConfig::new("user");
        assert_eq!(config.required_attributes(), "email");
        assert!(config.optional_attributes().is_none());
        assert!(config.save_restore_request());
        assert!(config.return_url().is_none());

        let prepared = config.prepare().expect("prepare");
        assert_eq!(prepared.landing_page, "/");
        assert_eq!(prepared.max_saved_body_bytes, 4096);
        assert_eq!(prepared.roles.roles(), &["user"]);
    }

    #[test]
    fn builder_allows_customization() {
        let prepared = GateConfig::builder("user,admin")
            .return_url("https://app.example.com/callback")
            .required_attributes("email,name")
            .optional_attributes("nickname")
            .save_restore_request(false)
            .landing_page("/home")
            .max_saved_body_bytes(128)
            .build()
            .prepare()
            .expect("prepare");

        assert_eq!(
            prepared.return_url.as_ref().map(Url::as_str),
            Some("https://app.example.com/callback")
        );
        assert_eq!(prepared.attributes.required(), &["email", "name"]);
        assert_eq!(prepared.attributes.optional(), &["nickname"]);
        assert!(!prepared.save_restore_request);
        assert_eq!(prepared.landing_page, "/home");
        assert_eq!(prepared.max_saved_body_bytes, 128);
    }

    #[test]
    fn return_url_default_substitution_is_expanded() {
        let prepared = GateConfig::builder("user")
            .return_url("${OPENID_GATE_TEST_UNSET_HOST:-https://fallback.example}/callback")
            .build()
            .prepare()
            .expect("prepare");
        assert_eq!(
            prepared.return_url.as_ref().map(Url::as_str),
            Some("https://fallback.example/callback")
        );
    }

    #[test]
    fn unresolvable_return_url_is_a_configuration_error() {
        let err = GateConfig::builder("user")
            .return_url("${OPENID_GATE_TEST_UNSET_HOST}/callback")
            .build()
            .prepare()
            .expect_err("should fail");
        assert!(matches!(err, ConfigurationError::InvalidReturnUrl { .. }));
    }

    #[test]
    fn missing_role_string_is_rejected() {
        let json = r#"{ "required_attributes": "email" }"#;
        let config: GateConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(
            config.prepare(),
            Err(ConfigurationError::MissingRoleString)
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let json = r#"{ "role_string": "user, auditor" }"#;
        let config: GateConfig = serde_json::from_str(json).expect("deserialize");
        let prepared = config.prepare().expect("prepare");

        assert_eq!(prepared.roles.roles(), &["user", "auditor"]);
        assert_eq!(prepared.attributes.required(), &["email"]);
        assert!(prepared.save_restore_request);
    }

    #[test]
    fn relative_landing_page_is_rejected() {
        let err = GateConfig::builder("user")
            .landing_page("home")
            .build()
            .prepare()
            .expect_err("should fail");
        assert!(err.to_string().contains("home"));
    }
}
