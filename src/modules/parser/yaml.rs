//! YAML profile parser

use manifold_core::{ConnectorConfig, ManifoldError, Namespace, Profile};
use serde::Deserialize;
use std::collections::HashMap;

use crate::env::EnvSubstitutor;

/// YAML parser for Manifold profile files
pub struct YamlParser;

/// On-disk profile schema: namespaces keyed by name, each carrying a
/// `type` tag plus flat connection parameters.
#[derive(Debug, Deserialize)]
struct RawProfile {
    name: String,

    #[serde(default)]
    namespaces: HashMap<String, RawNamespace>,
}

#[derive(Debug, Deserialize)]
struct RawNamespace {
    /// Dialect tag; `connector` is accepted as an alias
    #[serde(rename = "type", alias = "connector")]
    dialect: String,

    #[serde(flatten)]
    config: ConnectorConfig,
}

impl YamlParser {
    /// Parse a YAML profile, substituting `{{ env.VAR }}` placeholders
    /// first so credentials can live outside the file.
    pub fn parse(content: &str) -> Result<Profile, ManifoldError> {
        let substituted = EnvSubstitutor::new().substitute(content)?;
        Self::parse_raw(&substituted)
    }

    /// Parse a YAML profile without environment substitution.
    pub fn parse_raw(content: &str) -> Result<Profile, ManifoldError> {
        let raw: RawProfile = serde_yaml::from_str(content)
            .map_err(|e| ManifoldError::Config(format!("YAML parse error: {}", e)))?;

        // Map order is not deterministic; order namespaces by name.
        let mut namespaces: Vec<Namespace> = raw
            .namespaces
            .into_iter()
            .map(|(name, ns)| Namespace::new(name, ns.dialect, ns.config))
            .collect();
        namespaces.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Profile {
            name: raw.name,
            namespaces,
        })
    }
}
