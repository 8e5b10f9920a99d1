//! Verified identities returned by the provider round-trip.
//!
//! An `IdentityResult` is produced only by a verifier after it has
//! validated a provider callback. It is immutable once built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Attribute values keyed by attribute name.
///
/// Providers may return several values for one attribute; their order is
/// provider-defined and preserved.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// Error returned when an identity would be constructed without a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyIdentifier;

impl fmt::Display for EmptyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "identity identifier must not be empty")
    }
}

impl std::error::Error for EmptyIdentifier {}

/// The identity a provider vouched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIdentity")]
pub struct IdentityResult {
    /// Opaque identifier naming the authenticated subject.
    identifier: String,
    /// The provider that vouched for the identity.
    provider_url: Url,
    /// Attributes released by the provider.
    attributes: Attributes,
}

impl IdentityResult {
    /// Creates an identity.
    ///
    /// # Errors
    ///
    /// Returns `EmptyIdentifier` if `identifier` is empty or whitespace.
    pub fn new(
        identifier: impl Into<String>,
        provider_url: Url,
        attributes: Attributes,
    ) -> Result<Self, EmptyIdentifier> {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(EmptyIdentifier);
        }
        Ok(Self {
            identifier,
            provider_url,
            attributes,
        })
    }

    /// Returns the subject identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the provider URL.
    #[must_use]
    pub fn provider_url(&self) -> &Url {
        &self.provider_url
    }

    /// Returns all attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns every value of one attribute, in provider order.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&[String]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    /// Returns the first value of one attribute.
    #[must_use]
    pub fn first_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name)
            .and_then(<[String]>::first)
            .map(String::as_str)
    }
}

impl fmt::Display for IdentityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (via {})", self.identifier, self.provider_url)
    }
}

#[derive(Deserialize)]
struct RawIdentity {
    identifier: String,
    provider_url: Url,
    #[serde(default)]
    attributes: Attributes,
}

impl TryFrom<RawIdentity> for IdentityResult {
    type Error = EmptyIdentifier;

    fn try_from(raw: RawIdentity) -> Result<Self, Self::Error> {
        Self::new(raw.identifier, raw.provider_url, raw.attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> Url {
        Url::parse("https://idp.example/alice").expect("valid url")
    }

    #[test]
    fn new_identity_keeps_fields() {
        let mut attributes = Attributes::new();
        attributes.insert("email".to_string(), vec!["alice@example.com".to_string()]);

        let identity =
            IdentityResult::new("alice", provider(), attributes).expect("valid identity");

        assert_eq!(identity.identifier(), "alice");
        assert_eq!(identity.provider_url().as_str(), "https://idp.example/alice");
        assert_eq!(identity.first_attribute("email"), Some("alice@example.com"));
        assert!(identity.attribute("name").is_none());
    }

    #[test]
    fn empty_identifier_is_rejected() {
        assert_eq!(
            IdentityResult::new("", provider(), Attributes::new()),
            Err(EmptyIdentifier)
        );
        assert_eq!(
            IdentityResult::new("   ", provider(), Attributes::new()),
            Err(EmptyIdentifier)
        );
    }

    #[test]
    fn multi_valued_attribute_order_is_preserved() {
        let mut attributes = Attributes::new();
        attributes.insert(
            "groups".to_string(),
            vec!["zeta".to_string(), "alpha".to_string(), "mu".to_string()],
        );

        let identity = IdentityResult::new("bob", provider(), attributes).expect("valid");

        assert_eq!(
            identity.attribute("groups"),
            Some(&["zeta".to_string(), "alpha".to_string(), "mu".to_string()][..])
        );
    }

    #[test]
    fn deserialization_enforces_non_empty_identifier() {
        let json = r#"{"identifier":"","provider_url":"https://idp.example/"}"#;
        assert!(serde_json::from_str::<IdentityResult>(json).is_err());

        let json = r#"{"identifier":"carol","provider_url":"https://idp.example/"}"#;
        let identity: IdentityResult = serde_json::from_str(json).expect("deserialize");
        assert_eq!(identity.identifier(), "carol");
        assert!(identity.attributes().is_empty());
    }
}
