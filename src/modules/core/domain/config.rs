//! Backend connection configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ManifoldError;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Connection parameters for one backend session.
///
/// The same shape is used for every dialect; backend-specific settings
/// (session variables, driver switches) go into the open-ended `options`
/// map. A config is immutable once handed to a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port; adapters fall back to their backend default when unset
    #[serde(default)]
    pub port: Option<u16>,

    /// Login user
    pub username: String,

    /// Login password
    #[serde(default)]
    pub password: String,

    /// Database (catalog) to connect to
    pub database: String,

    /// Schema within the database, for backends that have one
    #[serde(default)]
    pub schema: Option<String>,

    /// Backend-specific options, applied as session settings where supported
    #[serde(default, alias = "configuration")]
    pub options: HashMap<String, serde_json::Value>,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl ConnectorConfig {
    /// Create a config with the required fields; everything else defaults.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: username.into(),
            password: String::new(),
            database: database.into(),
            schema: None,
            options: HashMap::new(),
            timeout_seconds: default_timeout(),
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add one backend-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Set the acquire timeout.
    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Check the invariants every connector relies on, without touching
    /// the network: host, username, and database are non-empty; port and
    /// timeout are positive when set.
    pub fn validate(&self) -> Result<(), ManifoldError> {
        if self.host.trim().is_empty() {
            return Err(ManifoldError::Validation("host cannot be empty".into()));
        }
        if self.username.trim().is_empty() {
            return Err(ManifoldError::Validation("username cannot be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(ManifoldError::Validation("database cannot be empty".into()));
        }
        if self.port == Some(0) {
            return Err(ManifoldError::Validation(
                "port must be a positive integer".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(ManifoldError::Validation(
                "timeout_seconds must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Build a config from a flat carrier map, keeping only keys under
    /// `prefix`. Keys under `<prefix>options.` (or the legacy
    /// `<prefix>configuration.`) collect into the options map; a numeric
    /// string under `<prefix>port` is coerced to an integer.
    pub fn from_config_map(
        map: &HashMap<String, serde_json::Value>,
        prefix: &str,
    ) -> Result<Self, ManifoldError> {
        let mut fields = serde_json::Map::new();
        let mut options = serde_json::Map::new();

        for (key, value) in map {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            if let Some(option_key) = rest
                .strip_prefix("options.")
                .or_else(|| rest.strip_prefix("configuration."))
            {
                options.insert(option_key.to_string(), value.clone());
            } else if rest == "port" {
                fields.insert("port".to_string(), coerce_integer(value));
            } else {
                fields.insert(rest.to_string(), value.clone());
            }
        }

        fields.insert("options".to_string(), serde_json::Value::Object(options));

        let config: Self = serde_json::from_value(serde_json::Value::Object(fields))
            .map_err(|e| ManifoldError::Config(format!("invalid carrier map: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from environment variables following the
    /// `<PREFIX>_HOST` / `_PORT` / `_USERNAME` / `_PASSWORD` / `_DATABASE`
    /// convention, with `<PREFIX>_OPTIONS_JSON` holding a JSON-encoded map
    /// of backend-specific options.
    pub fn from_env(prefix: &str) -> Result<Self, ManifoldError> {
        let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();

        let port = match var("PORT") {
            None => None,
            Some(raw) => Some(raw.parse::<u16>().map_err(|_| {
                ManifoldError::Validation(format!(
                    "{}_PORT must be a positive integer, got '{}'",
                    prefix, raw
                ))
            })?),
        };

        let timeout_seconds = match var("TIMEOUT_SECONDS") {
            None => default_timeout(),
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                ManifoldError::Validation(format!(
                    "{}_TIMEOUT_SECONDS must be a positive integer, got '{}'",
                    prefix, raw
                ))
            })?,
        };

        let options = match var("OPTIONS_JSON") {
            None => HashMap::new(),
            Some(raw) => serde_json::from_str::<HashMap<String, serde_json::Value>>(&raw)
                .map_err(|e| {
                    ManifoldError::Config(format!(
                        "{}_OPTIONS_JSON is not a JSON object: {}",
                        prefix, e
                    ))
                })?,
        };

        let config = Self {
            host: var("HOST").unwrap_or_else(default_host),
            port,
            username: var("USERNAME").unwrap_or_default(),
            password: var("PASSWORD").unwrap_or_default(),
            database: var("DATABASE").unwrap_or_default(),
            schema: var("SCHEMA"),
            options,
            timeout_seconds,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Coerce a numeric string to a JSON number, leaving other values as-is.
fn coerce_integer(value: &serde_json::Value) -> serde_json::Value {
    if let serde_json::Value::String(s) = value {
        if let Ok(n) = s.parse::<u64>() {
            return serde_json::Value::Number(n.into());
        }
    }
    value.clone()
}

/// Connection pool sizing for the sqlx-based adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    #[serde(default = "PoolConfig::default_max")]
    pub max_connections: u32,

    /// Minimum number of connections to keep open
    #[serde(default = "PoolConfig::default_min")]
    pub min_connections: u32,

    /// Idle connection timeout in seconds
    #[serde(default = "PoolConfig::default_idle")]
    pub idle_timeout_secs: u64,

    /// Maximum lifetime of a pooled connection in seconds
    #[serde(default = "PoolConfig::default_lifetime")]
    pub max_lifetime_secs: u64,
}

impl PoolConfig {
    fn default_max() -> u32 {
        10
    }

    fn default_min() -> u32 {
        1
    }

    fn default_idle() -> u64 {
        600
    }

    fn default_lifetime() -> u64 {
        1800
    }

    /// Idle timeout as a Duration
    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_timeout_secs)
    }

    /// Max lifetime as a Duration
    pub fn max_lifetime(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: Self::default_max(),
            min_connections: Self::default_min(),
            idle_timeout_secs: Self::default_idle(),
            max_lifetime_secs: Self::default_lifetime(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ConnectorConfig::new("localhost", "app", "analytics");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, None);
        assert_eq!(config.password, "");
        assert_eq!(config.schema, None);
        assert!(config.options.is_empty());
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = ConnectorConfig::new("db.internal", "app", "analytics")
            .with_port(3306)
            .with_password("secret")
            .with_schema("public")
            .with_option("sql_mode", json!("ANSI"))
            .with_timeout_seconds(5);
        assert_eq!(config.port, Some(3306));
        assert_eq!(config.password, "secret");
        assert_eq!(config.schema.as_deref(), Some("public"));
        assert_eq!(config.options["sql_mode"], json!("ANSI"));
        assert_eq!(config.timeout_seconds, 5);
    }

    #[test]
    fn test_validate_rejects_empty_required_fields() {
        assert!(ConnectorConfig::new("", "app", "db").validate().is_err());
        assert!(ConnectorConfig::new("h", "", "db").validate().is_err());
        assert!(ConnectorConfig::new("h", "app", "").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_port_and_timeout() {
        let config = ConnectorConfig::new("h", "app", "db").with_port(0);
        assert!(config.validate().is_err());

        let config = ConnectorConfig::new("h", "app", "db").with_timeout_seconds(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults_and_alias() {
        let config: ConnectorConfig = serde_json::from_value(json!({
            "username": "app",
            "database": "analytics",
            "configuration": {"spark.app.name": "carrier"}
        }))
        .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.options["spark.app.name"], json!("carrier"));
    }

    #[test]
    fn test_from_config_map_extracts_prefix() {
        let mut map = HashMap::new();
        map.insert("warehouse.host".to_string(), json!("10.85.24.173"));
        map.insert("warehouse.port".to_string(), json!("10009"));
        map.insert("warehouse.username".to_string(), json!("hue"));
        map.insert("warehouse.password".to_string(), json!("pass"));
        map.insert("warehouse.database".to_string(), json!("test"));
        map.insert(
            "warehouse.options.spark.app.name".to_string(),
            json!("carrier"),
        );
        map.insert(
            "warehouse.configuration.spark.executor.instances".to_string(),
            json!("1"),
        );
        map.insert("other.host".to_string(), json!("ignored"));

        let config = ConnectorConfig::from_config_map(&map, "warehouse.").unwrap();
        assert_eq!(config.host, "10.85.24.173");
        assert_eq!(config.port, Some(10009));
        assert_eq!(config.username, "hue");
        assert_eq!(config.database, "test");
        assert_eq!(config.options.len(), 2);
        assert_eq!(config.options["spark.app.name"], json!("carrier"));
        assert_eq!(config.options["spark.executor.instances"], json!("1"));
    }

    #[test]
    fn test_from_config_map_validates() {
        let mut map = HashMap::new();
        map.insert("db.host".to_string(), json!("localhost"));
        // username missing entirely
        map.insert("db.database".to_string(), json!("test"));
        assert!(ConnectorConfig::from_config_map(&map, "db.").is_err());
    }

    #[test]
    fn test_from_env_reads_prefixed_variables() {
        std::env::set_var("MFTEST_HOST", "env-host");
        std::env::set_var("MFTEST_PORT", "5433");
        std::env::set_var("MFTEST_USERNAME", "env-user");
        std::env::set_var("MFTEST_PASSWORD", "env-pass");
        std::env::set_var("MFTEST_DATABASE", "env-db");
        std::env::set_var("MFTEST_OPTIONS_JSON", r#"{"statement_timeout": 1000}"#);

        let config = ConnectorConfig::from_env("MFTEST").unwrap();
        assert_eq!(config.host, "env-host");
        assert_eq!(config.port, Some(5433));
        assert_eq!(config.username, "env-user");
        assert_eq!(config.password, "env-pass");
        assert_eq!(config.database, "env-db");
        assert_eq!(config.options["statement_timeout"], json!(1000));

        for name in [
            "MFTEST_HOST",
            "MFTEST_PORT",
            "MFTEST_USERNAME",
            "MFTEST_PASSWORD",
            "MFTEST_DATABASE",
            "MFTEST_OPTIONS_JSON",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_from_env_rejects_bad_port() {
        std::env::set_var("MFBADPORT_HOST", "h");
        std::env::set_var("MFBADPORT_PORT", "not-a-number");
        std::env::set_var("MFBADPORT_USERNAME", "u");
        std::env::set_var("MFBADPORT_DATABASE", "d");

        let result = ConnectorConfig::from_env("MFBADPORT");
        assert!(result.is_err());

        for name in [
            "MFBADPORT_HOST",
            "MFBADPORT_PORT",
            "MFBADPORT_USERNAME",
            "MFBADPORT_DATABASE",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_pool_config_defaults() {
        let pool = PoolConfig::default();
        assert_eq!(pool.max_connections, 10);
        assert_eq!(pool.min_connections, 1);
        assert_eq!(pool.idle_timeout().as_secs(), 600);
        assert_eq!(pool.max_lifetime().as_secs(), 1800);
    }
}
