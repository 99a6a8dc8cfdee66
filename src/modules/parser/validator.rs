//! Profile validation

use manifold_core::{ManifoldError, Profile};
use manifold_types::dialect;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Regex pattern for valid names (lower-kebab-case or lower_snake_case)
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:[-_][a-z0-9]+)*$").unwrap());

/// Validates a parsed profile before connectors are built from it.
pub struct ProfileValidator {
    strict_names: bool,
}

impl ProfileValidator {
    /// Validator with strict name checking.
    pub fn new() -> Self {
        Self { strict_names: true }
    }

    /// Validator with lenient name checking.
    pub fn lenient() -> Self {
        Self {
            strict_names: false,
        }
    }

    /// Validate the whole profile: names, dialect tags, uniqueness, and
    /// every namespace's connection parameters.
    pub fn validate(&self, profile: &Profile) -> Result<(), ManifoldError> {
        self.validate_name("profile", &profile.name)?;

        let mut seen = HashSet::new();
        for namespace in &profile.namespaces {
            self.validate_name("namespace", &namespace.name)?;

            if !seen.insert(namespace.name.as_str()) {
                return Err(ManifoldError::Validation(format!(
                    "duplicate namespace name: '{}'",
                    namespace.name
                )));
            }

            if !dialect::is_well_formed(&dialect::normalize(&namespace.dialect)) {
                return Err(ManifoldError::Validation(format!(
                    "namespace '{}' has a malformed dialect tag: '{}'",
                    namespace.name, namespace.dialect
                )));
            }

            namespace.config.validate().map_err(|e| {
                ManifoldError::Validation(format!("namespace '{}': {}", namespace.name, e))
            })?;
        }

        Ok(())
    }

    fn validate_name(&self, what: &str, name: &str) -> Result<(), ManifoldError> {
        if name.is_empty() {
            return Err(ManifoldError::Validation(format!(
                "{} name cannot be empty",
                what
            )));
        }
        if self.strict_names && !NAME_PATTERN.is_match(name) {
            return Err(ManifoldError::Validation(format!(
                "invalid {} name '{}': must be lower-kebab-case or lower_snake_case",
                what, name
            )));
        }
        Ok(())
    }
}

impl Default for ProfileValidator {
    fn default() -> Self {
        Self::new()
    }
}
