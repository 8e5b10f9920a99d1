//! Attribute lists requested from the provider.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Attributes the provider must or may release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRequest {
    required: Vec<String>,
    optional: Vec<String>,
}

impl AttributeRequest {
    /// Parses the required and optional comma-separated lists.
    ///
    /// An absent or blank optional list means no optional attributes.
    /// An attribute listed in both lists is treated as required.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::MalformedAttributeList` when an entry
    /// is empty or contains characters outside `[A-Za-z0-9_.:-]`.
    pub fn parse(required: &str, optional: Option<&str>) -> Result<Self, ConfigurationError> {
        let required = parse_list(required)?;
        let optional = match optional {
            Some(list) if !list.trim().is_empty() => parse_list(list)?
                .into_iter()
                .filter(|name| !required.contains(name))
                .collect(),
            _ => Vec::new(),
        };
        Ok(Self { required, optional })
    }

    /// Returns the attributes the provider must release.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Returns the attributes the provider may release.
    #[must_use]
    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    /// Returns required then optional attribute names.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .map(String::as_str)
    }
}

fn parse_list(list: &str) -> Result<Vec<String>, ConfigurationError> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut names: Vec<String> = Vec::new();
    for token in list.split(',').map(str::trim) {
        if token.is_empty() {
            return Err(ConfigurationError::MalformedAttributeList {
                list: list.to_string(),
                reason: "empty attribute name".to_string(),
            });
        }
        if let Some(bad) = token.chars().find(|c| !is_attribute_char(*c)) {
            return Err(ConfigurationError::MalformedAttributeList {
                list: list.to_string(),
                reason: format!("attribute '{token}' contains '{bad}'"),
            });
        }
        if !names.iter().any(|n| n == token) {
            names.push(token.to_string());
        }
    }
    Ok(names)
}

fn is_attribute_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_required_and_optional() {
        let request =
            AttributeRequest::parse("email, name", Some("given_name,family_name")).expect("parse");
        assert_eq!(request.required(), &["email", "name"]);
        assert_eq!(request.optional(), &["given_name", "family_name"]);
        assert_eq!(
            request.all().collect::<Vec<_>>(),
            vec!["email", "name", "given_name", "family_name"]
        );
    }

    #[test]
    fn absent_or_blank_optional_list_is_empty() {
        assert!(
            AttributeRequest::parse("email", None)
                .expect("parse")
                .optional()
                .is_empty()
        );
        assert!(
            AttributeRequest::parse("email", Some("  "))
                .expect("parse")
                .optional()
                .is_empty()
        );
    }

    #[test]
    fn attribute_in_both_lists_is_required_only() {
        let request = AttributeRequest::parse("email", Some("email,nickname")).expect("parse");
        assert_eq!(request.required(), &["email"]);
        assert_eq!(request.optional(), &["nickname"]);
    }

    #[test]
    fn malformed_lists_are_rejected() {
        assert!(matches!(
            AttributeRequest::parse("email,,name", None),
            Err(ConfigurationError::MalformedAttributeList { .. })
        ));
        assert!(matches!(
            AttributeRequest::parse("email", Some("nick name")),
            Err(ConfigurationError::MalformedAttributeList { .. })
        ));
    }

    #[test]
    fn namespaced_claim_names_are_accepted() {
        let request =
            AttributeRequest::parse("email,cognito:groups,https.claims-v1", None).expect("parse");
        assert_eq!(request.required().len(), 3);
    }
}
