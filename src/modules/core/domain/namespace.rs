//! Named connection namespaces

use serde::{Deserialize, Serialize};

use super::ConnectorConfig;

/// One named logical connection: a dialect tag plus the connection
/// parameters the matching adapter needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    /// Unique name within a profile (used by hosts to address the session)
    pub name: String,

    /// Dialect tag resolved through the connector registry
    #[serde(rename = "type")]
    pub dialect: String,

    /// Connection parameters
    #[serde(flatten)]
    pub config: ConnectorConfig,
}

impl Namespace {
    /// Create a namespace from its parts.
    pub fn new(
        name: impl Into<String>,
        dialect: impl Into<String>,
        config: ConnectorConfig,
    ) -> Self {
        Self {
            name: name.into(),
            dialect: dialect.into(),
            config,
        }
    }
}

/// The host-facing configuration surface: a named set of namespaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name
    pub name: String,

    /// Configured namespaces, ordered by name
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
}

impl Profile {
    /// Create an empty profile with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespaces: Vec::new(),
        }
    }

    /// Find a namespace by name.
    pub fn find_namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.iter().find(|n| n.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_namespace() {
        let mut profile = Profile::new("analytics-stack");
        profile.namespaces.push(Namespace::new(
            "warehouse",
            "mysql",
            ConnectorConfig::new("localhost", "app", "analytics"),
        ));

        assert!(profile.find_namespace("warehouse").is_some());
        assert!(profile.find_namespace("missing").is_none());
    }

    #[test]
    fn test_namespace_serde_round_trip() {
        let namespace = Namespace::new(
            "warehouse",
            "mysql",
            ConnectorConfig::new("localhost", "app", "analytics").with_port(3306),
        );
        let encoded = serde_json::to_string(&namespace).unwrap();
        assert!(encoded.contains("\"type\":\"mysql\""));
        assert!(encoded.contains("\"port\":3306"));

        let decoded: Namespace = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.name, "warehouse");
        assert_eq!(decoded.dialect, "mysql");
        assert_eq!(decoded.config.port, Some(3306));
    }
}
