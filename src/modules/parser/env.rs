//! Environment variable substitution

use manifold_core::ManifoldError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex pattern for environment variable placeholders: {{ env.VAR_NAME }}
static ENV_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Replaces `{{ env.VAR }}` placeholders with process environment values.
///
/// Strict mode fails when a referenced variable is unset; lenient mode
/// leaves the placeholder in place (useful for partial rendering).
pub struct EnvSubstitutor {
    strict: bool,
}

impl EnvSubstitutor {
    /// Strict substitutor: unset variables are an error.
    pub fn new() -> Self {
        Self { strict: true }
    }

    /// Lenient substitutor: unset variables keep their placeholder.
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    /// Substitute every placeholder in `content`. A `.env` file in the
    /// working directory is loaded first, if present.
    pub fn substitute(&self, content: &str) -> Result<String, ManifoldError> {
        let _ = dotenvy::dotenv();

        let mut missing: Vec<String> = Vec::new();
        let substituted = ENV_PATTERN.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if self.strict {
                        missing.push(var_name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });

        if !missing.is_empty() {
            return Err(ManifoldError::EnvVar(missing.join(", ")));
        }

        Ok(substituted.into_owned())
    }

    /// Check if a string contains environment variable placeholders.
    pub fn has_placeholders(content: &str) -> bool {
        ENV_PATTERN.is_match(content)
    }
}

impl Default for EnvSubstitutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_placeholders() {
        assert!(EnvSubstitutor::has_placeholders("{{ env.WAREHOUSE_PASSWORD }}"));
        assert!(EnvSubstitutor::has_placeholders("{{env.VAR}}"));
        assert!(!EnvSubstitutor::has_placeholders("password: plain"));
        assert!(!EnvSubstitutor::has_placeholders("{{ something.else }}"));
    }

    #[test]
    fn test_substitute_known_variable() {
        std::env::set_var("MANIFOLD_ENV_TEST", "resolved");
        let result = EnvSubstitutor::new()
            .substitute("password: {{ env.MANIFOLD_ENV_TEST }}")
            .unwrap();
        assert_eq!(result, "password: resolved");
        std::env::remove_var("MANIFOLD_ENV_TEST");
    }

    #[test]
    fn test_substitute_missing_variable_strict() {
        let result = EnvSubstitutor::new().substitute("{{ env.MANIFOLD_MISSING_VAR_XYZ }}");
        assert!(matches!(result, Err(ManifoldError::EnvVar(_))));
    }

    #[test]
    fn test_substitute_missing_variable_lenient() {
        let result = EnvSubstitutor::lenient()
            .substitute("{{ env.MANIFOLD_MISSING_VAR_XYZ }}")
            .unwrap();
        assert_eq!(result, "{{ env.MANIFOLD_MISSING_VAR_XYZ }}");
    }

    #[test]
    fn test_error_names_every_missing_variable() {
        let result = EnvSubstitutor::new()
            .substitute("{{ env.MANIFOLD_MISSING_A }} {{ env.MANIFOLD_MISSING_B }}");
        let message = result.unwrap_err().to_string();
        assert!(message.contains("MANIFOLD_MISSING_A"));
        assert!(message.contains("MANIFOLD_MISSING_B"));
    }
}
