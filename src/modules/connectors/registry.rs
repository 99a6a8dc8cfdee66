//! Dialect registry
//!
//! A process-wide mapping from dialect names to connector factories.
//! Adapter packages register themselves through an explicit call from the
//! host's initialization path, never as an import side effect, so
//! registration order stays deterministic and testable.

use manifold_core::{ConnectorConfig, ManifoldError};
use manifold_types::dialect;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::traits::Connector;
use crate::{mysql, postgres};

/// Factory producing a connector from a validated configuration.
///
/// Factories construct without performing I/O; the session is established
/// by `Connector::connect` or lazily on first use.
pub type ConnectorFactory =
    Arc<dyn Fn(ConnectorConfig) -> Result<Arc<dyn Connector>, ManifoldError> + Send + Sync>;

/// Mapping from normalized dialect names to connector factories.
///
/// All reads and writes go through one lock; the map itself is never
/// exposed. Re-registering a dialect is rejected: a duplicate always
/// signals a wiring mistake, and failing at registration time keeps the
/// winner independent of load order.
pub struct ConnectorRegistry {
    entries: RwLock<HashMap<String, ConnectorFactory>>,
}

impl ConnectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a factory for `dialect_name`.
    ///
    /// Names are normalized (trimmed, lowercased) before insertion.
    /// Fails when the normalized name is already registered.
    pub fn register(
        &self,
        dialect_name: &str,
        factory: ConnectorFactory,
    ) -> Result<(), ManifoldError> {
        let key = dialect::normalize(dialect_name);
        if key.is_empty() {
            return Err(ManifoldError::Validation(
                "dialect name cannot be empty".into(),
            ));
        }

        let mut entries = self.write_entries();
        if entries.contains_key(&key) {
            return Err(ManifoldError::DuplicateRegistration(key));
        }
        entries.insert(key.clone(), factory);
        debug!(dialect = %key, "registered connector factory");
        Ok(())
    }

    /// Look up the factory for `dialect_name`.
    ///
    /// The error for an unknown dialect lists every registered name.
    pub fn resolve(&self, dialect_name: &str) -> Result<ConnectorFactory, ManifoldError> {
        let key = dialect::normalize(dialect_name);
        let entries = self.read_entries();
        entries
            .get(&key)
            .cloned()
            .ok_or_else(|| ManifoldError::UnknownDialect {
                dialect: key,
                known: sorted_keys(&entries),
            })
    }

    /// Resolve `dialect_name` and invoke its factory with `config`.
    pub fn create(
        &self,
        dialect_name: &str,
        config: ConnectorConfig,
    ) -> Result<Arc<dyn Connector>, ManifoldError> {
        let factory = self.resolve(dialect_name)?;
        factory(config)
    }

    /// Whether a dialect is registered.
    pub fn contains(&self, dialect_name: &str) -> bool {
        self.read_entries()
            .contains_key(&dialect::normalize(dialect_name))
    }

    /// Registered dialect names, sorted.
    pub fn dialects(&self) -> Vec<String> {
        sorted_keys(&self.read_entries())
    }

    /// Number of registered dialects.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    // A poisoned lock only means another thread panicked while holding it;
    // the map is still structurally sound, so recover the guard.
    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ConnectorFactory>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ConnectorFactory>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_keys(entries: &HashMap<String, ConnectorFactory>) -> Vec<String> {
    let mut keys: Vec<String> = entries.keys().cloned().collect();
    keys.sort();
    keys
}

/// The process-wide registry: empty at process start, alive for the
/// process lifetime, reachable only through the registry API.
static GLOBAL_REGISTRY: Lazy<ConnectorRegistry> = Lazy::new(ConnectorRegistry::new);

/// Access the process-wide registry.
pub fn global() -> &'static ConnectorRegistry {
    &GLOBAL_REGISTRY
}

/// Register the builtin adapters on `registry`.
///
/// Hosts call this once during initialization; a second call fails with a
/// duplicate-registration error, consistent with the registry policy.
pub fn register_builtins(registry: &ConnectorRegistry) -> Result<(), ManifoldError> {
    mysql::register(registry)?;
    postgres::register(registry)?;
    Ok(())
}
