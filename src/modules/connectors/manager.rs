//! Namespace-level connector manager
//!
//! Hosts that configure several namespaces use the manager to build,
//! address, health-check, and shut down one live connector per namespace.
//! Anything beyond one logical session per namespace (pooling, retry) is
//! layered by the host.

use manifold_core::{ManifoldError, Namespace};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::registry::ConnectorRegistry;
use crate::traits::Connector;

/// Holds the live connector for each configured namespace.
pub struct ConnectorManager {
    connectors: RwLock<HashMap<String, Arc<dyn Connector>>>,
}

impl ConnectorManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            connectors: RwLock::new(HashMap::new()),
        }
    }

    /// Build and connect a connector for every namespace, in parallel.
    ///
    /// Factory resolution happens up front, so an unknown dialect fails
    /// before any session is opened; connection failures surface after
    /// all startup tasks finish.
    pub async fn initialize(
        &self,
        registry: &ConnectorRegistry,
        namespaces: &[Namespace],
    ) -> Result<(), ManifoldError> {
        use tokio::task::JoinSet;

        let mut set = JoinSet::new();
        for namespace in namespaces {
            let connector = registry.create(&namespace.dialect, namespace.config.clone())?;
            let name = namespace.name.clone();
            set.spawn(async move {
                connector.connect().await?;
                Ok::<_, ManifoldError>((name, connector))
            });
        }

        let mut connectors = self.connectors.write().await;
        while let Some(result) = set.join_next().await {
            let (name, connector) = result
                .map_err(|e| ManifoldError::Connection(format!("startup task failed: {}", e)))??;
            connectors.insert(name, connector);
        }

        info!(count = connectors.len(), "initialized namespace connectors");
        Ok(())
    }

    /// Get the connector for a namespace.
    pub async fn get(&self, name: &str) -> Result<Arc<dyn Connector>, ManifoldError> {
        let connectors = self.connectors.read().await;
        connectors
            .get(name)
            .cloned()
            .ok_or_else(|| ManifoldError::NotFound(format!("namespace '{}' is not initialized", name)))
    }

    /// Whether a namespace has a live connector.
    pub async fn has(&self, name: &str) -> bool {
        self.connectors.read().await.contains_key(name)
    }

    /// Names of all initialized namespaces.
    pub async fn names(&self) -> Vec<String> {
        self.connectors.read().await.keys().cloned().collect()
    }

    /// Run `test_connection` on every namespace with bounded concurrency.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        use futures::stream::{self, StreamExt};

        let connectors = self.connectors.read().await;
        let targets: Vec<_> = connectors
            .iter()
            .map(|(name, connector)| (name.clone(), Arc::clone(connector)))
            .collect();
        drop(connectors);

        stream::iter(targets)
            .map(|(name, connector)| async move {
                let healthy = connector.test_connection().await;
                (name, healthy)
            })
            .buffer_unordered(16)
            .collect()
            .await
    }

    /// Close every connector, aggregating failures into one error.
    pub async fn close_all(&self) -> Result<(), ManifoldError> {
        let connectors = self.connectors.read().await;
        let mut errors = Vec::new();

        for (name, connector) in connectors.iter() {
            if let Err(e) = connector.close().await {
                errors.push(format!("{}: {}", name, e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ManifoldError::Connection(format!(
                "errors closing connectors: {}",
                errors.join(", ")
            )))
        }
    }
}

impl Default for ConnectorManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Params;
    use async_trait::async_trait;
    use manifold_core::ConnectorConfig;
    use manifold_types::{ColumnSchema, ExecuteSQLResult};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct EchoConnector {
        database: String,
        closed: AtomicBool,
    }

    #[async_trait]
    impl Connector for EchoConnector {
        async fn connect(&self) -> Result<(), ManifoldError> {
            self.closed.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn execute_query(
            &self,
            _sql: &str,
            _params: Option<&Params>,
        ) -> Result<ExecuteSQLResult, ManifoldError> {
            Ok(ExecuteSQLResult::success(
                vec!["database".to_string()],
                vec![vec![serde_json::json!(self.database)]],
            ))
        }

        async fn get_databases(&self) -> Result<Vec<String>, ManifoldError> {
            Ok(vec![self.database.clone()])
        }

        async fn get_tables(
            &self,
            _database: &str,
            _schema: Option<&str>,
        ) -> Result<Vec<String>, ManifoldError> {
            Ok(Vec::new())
        }

        async fn get_views(
            &self,
            _database: &str,
            _schema: Option<&str>,
        ) -> Result<Vec<String>, ManifoldError> {
            Ok(Vec::new())
        }

        async fn get_schema(
            &self,
            _database: &str,
            _schema: Option<&str>,
            _table: &str,
        ) -> Result<Vec<ColumnSchema>, ManifoldError> {
            Ok(Vec::new())
        }

        async fn test_connection(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        async fn close(&self) -> Result<(), ManifoldError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn dialect(&self) -> &'static str {
            "echo"
        }
    }

    fn echo_registry() -> ConnectorRegistry {
        let registry = ConnectorRegistry::new();
        registry
            .register(
                "echo",
                Arc::new(|config| {
                    config.validate()?;
                    Ok(Arc::new(EchoConnector {
                        database: config.database,
                        closed: AtomicBool::new(true),
                    }) as Arc<dyn Connector>)
                }),
            )
            .unwrap();
        registry
    }

    fn namespace(name: &str) -> Namespace {
        Namespace::new(name, "echo", ConnectorConfig::new("localhost", "u", name))
    }

    #[tokio::test]
    async fn test_empty_manager() {
        let manager = ConnectorManager::new();
        assert!(manager.names().await.is_empty());
        assert!(manager.get("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_initialize_and_get() {
        let manager = ConnectorManager::new();
        let registry = echo_registry();
        manager
            .initialize(&registry, &[namespace("warehouse"), namespace("reporting")])
            .await
            .unwrap();

        assert!(manager.has("warehouse").await);
        let connector = manager.get("warehouse").await.unwrap();
        assert_eq!(connector.dialect(), "echo");

        let mut names = manager.names().await;
        names.sort();
        assert_eq!(names, vec!["reporting", "warehouse"]);
    }

    #[tokio::test]
    async fn test_initialize_unknown_dialect_fails_fast() {
        let manager = ConnectorManager::new();
        let registry = echo_registry();
        let bad = Namespace::new("broken", "hive", ConnectorConfig::new("h", "u", "d"));

        let err = manager.initialize(&registry, &[bad]).await.unwrap_err();
        assert!(matches!(err, ManifoldError::UnknownDialect { .. }));
    }

    #[tokio::test]
    async fn test_health_check_and_close_all() {
        let manager = ConnectorManager::new();
        let registry = echo_registry();
        manager
            .initialize(&registry, &[namespace("warehouse")])
            .await
            .unwrap();

        let health = manager.health_check_all().await;
        assert_eq!(health.get("warehouse"), Some(&true));

        manager.close_all().await.unwrap();
        let health = manager.health_check_all().await;
        assert_eq!(health.get("warehouse"), Some(&false));
    }
}
