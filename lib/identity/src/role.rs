//! Statically granted roles.
//!
//! Roles are not derived from the provider. The deployer lists them once in
//! the role string and every identity the gate establishes receives all of
//! them.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Ordered set of role names.
///
/// Order follows the role string; duplicates keep their first position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet {
    roles: Vec<String>,
}

impl RoleSet {
    /// Creates an empty role set.
    #[must_use]
    pub fn none() -> Self {
        Self { roles: Vec::new() }
    }

    /// Creates a role set from role names, dropping duplicates.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut roles: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !roles.contains(&name) {
                roles.push(name);
            }
        }
        Self { roles }
    }

    /// Parses a comma-separated role string.
    ///
    /// Tokens are trimmed. A missing string, an empty string, or an empty
    /// token between commas is rejected.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::MissingRoleString` or
    /// `ConfigurationError::MalformedRoleString`.
    pub fn parse(role_string: Option<&str>) -> Result<Self, ConfigurationError> {
        let value = role_string.ok_or(ConfigurationError::MissingRoleString)?;
        if value.trim().is_empty() {
            return Err(ConfigurationError::MalformedRoleString {
                value: value.to_string(),
                reason: "no role names".to_string(),
            });
        }

        let mut names = Vec::new();
        for token in value.split(',').map(str::trim) {
            if token.is_empty() {
                return Err(ConfigurationError::MalformedRoleString {
                    value: value.to_string(),
                    reason: "empty role name".to_string(),
                });
            }
            if token.chars().any(char::is_whitespace) {
                return Err(ConfigurationError::MalformedRoleString {
                    value: value.to_string(),
                    reason: format!("role name '{token}' contains whitespace"),
                });
            }
            names.push(token);
        }

        Ok(Self::from_names(names))
    }

    /// Returns true if the role is granted.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns the roles as a slice.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Returns true if no roles are granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
