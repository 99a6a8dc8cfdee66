//! PostgreSQL connector implementation

use async_trait::async_trait;
use manifold_core::{ConnectorConfig, ManifoldError, PoolConfig};
use manifold_types::{dialect, ColumnSchema, ExecuteSQLResult};
use sqlx::postgres::{PgColumn, PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::bind::{self, PlaceholderStyle};
use crate::registry::ConnectorRegistry;
use crate::traits::{Connector, Params};

const DEFAULT_SCHEMA: &str = "public";

enum SessionState {
    Idle,
    Connected(PgPool),
    Closed,
}

/// PostgreSQL database connector backed by a sqlx pool.
///
/// Construction validates the configuration without any network I/O; the
/// pool is built on `connect` or on first use. Safe for concurrent
/// callers: operations check out pooled connections independently.
pub struct PostgresConnector {
    config: ConnectorConfig,
    pool_config: PoolConfig,
    state: RwLock<SessionState>,
}

impl PostgresConnector {
    const DEFAULT_PORT: u16 = 5432;

    /// Create a connector with default pool sizing.
    pub fn new(config: ConnectorConfig) -> Result<Self, ManifoldError> {
        Self::with_pool(config, PoolConfig::default())
    }

    /// Create a connector with custom pool sizing.
    pub fn with_pool(
        config: ConnectorConfig,
        pool_config: PoolConfig,
    ) -> Result<Self, ManifoldError> {
        config.validate()?;
        Ok(Self {
            config,
            pool_config,
            state: RwLock::new(SessionState::Idle),
        })
    }

    /// The schema used for introspection: the explicit argument, then the
    /// configured schema, then `public`.
    fn effective_schema<'a>(&'a self, schema: Option<&'a str>) -> &'a str {
        schema
            .or(self.config.schema.as_deref())
            .unwrap_or(DEFAULT_SCHEMA)
    }

    /// Get the live pool, establishing the session lazily on first use.
    /// A closed connector stays closed until `connect` is called again.
    async fn pool(&self) -> Result<PgPool, ManifoldError> {
        {
            let state = self.state.read().await;
            match &*state {
                SessionState::Connected(pool) => return Ok(pool.clone()),
                SessionState::Closed => {
                    return Err(ManifoldError::Connection("connector is closed".into()))
                }
                SessionState::Idle => {}
            }
        }
        self.connect().await?;
        let state = self.state.read().await;
        match &*state {
            SessionState::Connected(pool) => Ok(pool.clone()),
            _ => Err(ManifoldError::Connection("connector is closed".into())),
        }
    }

    async fn open_pool(&self) -> Result<PgPool, ManifoldError> {
        let options = PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port.unwrap_or(Self::DEFAULT_PORT))
            .username(&self.config.username)
            .password(&self.config.password)
            .database(&self.config.database);

        let mut pool_options = PgPoolOptions::new()
            .max_connections(self.pool_config.max_connections)
            .min_connections(self.pool_config.min_connections)
            .acquire_timeout(Duration::from_secs(self.config.timeout_seconds))
            .idle_timeout(self.pool_config.idle_timeout())
            .max_lifetime(self.pool_config.max_lifetime());

        let session = bind::session_statements(&self.config.options, "SET")?;
        if !session.is_empty() {
            let session = Arc::new(session);
            pool_options = pool_options.after_connect(move |conn, _meta| {
                let session = Arc::clone(&session);
                Box::pin(async move {
                    for statement in session.iter() {
                        sqlx::query(statement).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            });
        }

        debug!(host = %self.config.host, database = %self.config.database, "connecting to PostgreSQL");
        pool_options
            .connect_with(options)
            .await
            .map_err(|e| ManifoldError::Connection(format!("PostgreSQL connection failed: {}", e)))
    }
}

/// Classify a driver error: transport-level failures mean the session is
/// gone; everything else is an execution failure with the backend message.
fn driver_error(e: sqlx::Error) -> ManifoldError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            ManifoldError::Connection(format!("PostgreSQL connection lost: {}", e))
        }
        other => ManifoldError::Query(format!("PostgreSQL query failed: {}", other)),
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &serde_json::Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        serde_json::Value::Null => query.bind(None::<String>),
        serde_json::Value::Bool(b) => query.bind(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.clone()),
    }
}

fn rows_to_result(rows: &[PgRow]) -> ExecuteSQLResult {
    let Some(first) = rows.first() else {
        return ExecuteSQLResult::empty();
    };
    let columns: Vec<String> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let data = rows
        .iter()
        .map(|row| row.columns().iter().map(|c| column_value(row, c)).collect())
        .collect();
    ExecuteSQLResult::success(columns, data)
}

/// Decode a column into a JSON value by the driver's reported type name,
/// falling back to a string and then to null.
fn column_value(row: &PgRow, column: &PgColumn) -> serde_json::Value {
    let type_name = column.type_info().name();
    let idx = column.ordinal();

    match type_name {
        "BOOL" => row
            .try_get::<bool, _>(idx)
            .map(serde_json::Value::Bool)
            .unwrap_or(serde_json::Value::Null),
        "INT2" => row
            .try_get::<i16, _>(idx)
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "INT4" => row
            .try_get::<i32, _>(idx)
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "INT8" => row
            .try_get::<i64, _>(idx)
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "FLOAT4" => row
            .try_get::<f32, _>(idx)
            .map(|v| {
                serde_json::Number::from_f64(v as f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            })
            .unwrap_or(serde_json::Value::Null),
        "FLOAT8" => row
            .try_get::<f64, _>(idx)
            .map(|v| {
                serde_json::Number::from_f64(v)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            })
            .unwrap_or(serde_json::Value::Null),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(idx)
            .map(|v| serde_json::Value::String(v.to_string()))
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .map(|v| serde_json::Value::String(v.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(|v| serde_json::Value::String(v.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(serde_json::Value::Null),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(idx)
            .map(|v| serde_json::Value::String(v.to_string()))
            .unwrap_or(serde_json::Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(idx)
            .unwrap_or(serde_json::Value::Null),
        _ => row
            .try_get::<String, _>(idx)
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self) -> Result<(), ManifoldError> {
        let mut state = self.state.write().await;
        if let SessionState::Connected(_) = &*state {
            return Ok(());
        }
        let pool = self.open_pool().await?;
        *state = SessionState::Connected(pool);
        Ok(())
    }

    async fn execute_query(
        &self,
        sql: &str,
        params: Option<&Params>,
    ) -> Result<ExecuteSQLResult, ManifoldError> {
        let pool = self.pool().await?;

        let (statement, values) = match params {
            Some(p) if !p.is_empty() => bind::expand_named(sql, p, PlaceholderStyle::Numbered)?,
            _ => (sql.to_string(), Vec::new()),
        };

        let mut query = sqlx::query(&statement);
        for value in &values {
            query = bind_value(query, value);
        }

        let rows = query.fetch_all(&pool).await.map_err(driver_error)?;
        Ok(rows_to_result(&rows))
    }

    async fn get_databases(&self) -> Result<Vec<String>, ManifoldError> {
        let pool = self.pool().await?;
        let rows =
            sqlx::query("SELECT datname FROM pg_database WHERE datistemplate = false ORDER BY datname")
                .fetch_all(&pool)
                .await
                .map_err(driver_error)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(driver_error))
            .collect()
    }

    async fn get_tables(
        &self,
        database: &str,
        schema: Option<&str>,
    ) -> Result<Vec<String>, ManifoldError> {
        let pool = self.pool().await?;

        let exists = sqlx::query("SELECT 1 FROM pg_database WHERE datname = $1")
            .bind(database)
            .fetch_optional(&pool)
            .await
            .map_err(driver_error)?;
        if exists.is_none() {
            return Err(ManifoldError::NotFound(format!(
                "database '{}' does not exist",
                database
            )));
        }

        // information_schema only covers the connected database, so a
        // mismatched catalog yields an empty list rather than an error.
        let rows = sqlx::query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_catalog = $1 AND table_schema = $2 AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        )
        .bind(database)
        .bind(self.effective_schema(schema))
        .fetch_all(&pool)
        .await
        .map_err(driver_error)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(driver_error))
            .collect()
    }

    async fn get_views(
        &self,
        database: &str,
        schema: Option<&str>,
    ) -> Result<Vec<String>, ManifoldError> {
        let pool = self.pool().await?;

        let result = sqlx::query(
            "SELECT table_name FROM information_schema.views \
             WHERE table_catalog = $1 AND table_schema = $2 ORDER BY table_name",
        )
        .bind(database)
        .bind(self.effective_schema(schema))
        .fetch_all(&pool)
        .await;

        match result {
            Ok(rows) => rows
                .iter()
                .map(|row| row.try_get::<String, _>(0).map_err(driver_error))
                .collect(),
            Err(e) => {
                warn!(database = %database, error = %e, "failed to list PostgreSQL views");
                Ok(Vec::new())
            }
        }
    }

    async fn get_schema(
        &self,
        _database: &str,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnSchema>, ManifoldError> {
        let pool = self.pool().await?;

        let rows = sqlx::query(
            "SELECT c.ordinal_position, c.column_name, c.data_type, c.is_nullable, c.column_default, \
             EXISTS (SELECT 1 FROM information_schema.table_constraints tc \
                     JOIN information_schema.key_column_usage kcu \
                       ON tc.constraint_name = kcu.constraint_name \
                      AND tc.table_schema = kcu.table_schema \
                     WHERE tc.constraint_type = 'PRIMARY KEY' \
                       AND tc.table_schema = c.table_schema \
                       AND tc.table_name = c.table_name \
                       AND kcu.column_name = c.column_name) AS primary_key \
             FROM information_schema.columns c \
             WHERE c.table_schema = $1 AND c.table_name = $2 \
             ORDER BY c.ordinal_position",
        )
        .bind(self.effective_schema(schema))
        .bind(table)
        .fetch_all(&pool)
        .await
        .map_err(driver_error)?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let ordinal: i32 = row.try_get("ordinal_position").map_err(driver_error)?;
            let name: String = row.try_get("column_name").map_err(driver_error)?;
            let data_type: String = row.try_get("data_type").map_err(driver_error)?;
            let nullable: String = row.try_get("is_nullable").map_err(driver_error)?;
            let default_value: Option<String> =
                row.try_get("column_default").map_err(driver_error)?;
            let primary_key: bool = row.try_get("primary_key").map_err(driver_error)?;

            columns.push(ColumnSchema {
                ordinal: ordinal.saturating_sub(1) as u32,
                name,
                data_type,
                comment: None,
                nullable: nullable.eq_ignore_ascii_case("YES"),
                primary_key,
                default_value,
            });
        }
        Ok(columns)
    }

    async fn test_connection(&self) -> bool {
        let pool = match self.pool().await {
            Ok(pool) => pool,
            Err(_) => return false,
        };
        sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok()
    }

    async fn close(&self) -> Result<(), ManifoldError> {
        let mut state = self.state.write().await;
        if let SessionState::Connected(pool) = &*state {
            pool.close().await;
        }
        *state = SessionState::Closed;
        Ok(())
    }

    fn dialect(&self) -> &'static str {
        dialect::POSTGRES
    }
}

/// Adapter registration entry point: wires the `postgres` dialect factory,
/// called once from the host's initialization path.
pub fn register(registry: &ConnectorRegistry) -> Result<(), ManifoldError> {
    registry.register(
        dialect::POSTGRES,
        Arc::new(|config| Ok(Arc::new(PostgresConnector::new(config)?) as Arc<dyn Connector>)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> ConnectorConfig {
        ConnectorConfig::new("127.0.0.1", "u", "d")
            .with_port(9)
            .with_timeout_seconds(2)
    }

    #[test]
    fn test_new_validates_without_network() {
        let result = PostgresConnector::new(ConnectorConfig::new("h", "", "d"));
        assert!(matches!(result, Err(ManifoldError::Validation(_))));

        assert!(PostgresConnector::new(unreachable_config()).is_ok());
    }

    #[test]
    fn test_effective_schema_precedence() {
        let connector = PostgresConnector::new(
            ConnectorConfig::new("h", "u", "d").with_schema("reporting"),
        )
        .unwrap();
        assert_eq!(connector.effective_schema(Some("explicit")), "explicit");
        assert_eq!(connector.effective_schema(None), "reporting");

        let bare = PostgresConnector::new(ConnectorConfig::new("h", "u", "d")).unwrap();
        assert_eq!(bare.effective_schema(None), "public");
    }

    #[tokio::test]
    async fn test_operations_after_close_fail_with_connection_error() {
        let connector = PostgresConnector::new(unreachable_config()).unwrap();
        connector.close().await.unwrap();
        connector.close().await.unwrap(); // idempotent

        let err = connector.execute_query("SELECT 1", None).await.unwrap_err();
        assert!(err.is_connection());

        let err = connector.get_tables("d", None).await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_test_connection_unreachable_returns_false() {
        let connector = PostgresConnector::new(unreachable_config()).unwrap();
        assert!(!connector.test_connection().await);
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_postgres_round_trip() {
        let config = ConnectorConfig::from_env("POSTGRES").unwrap();
        let connector = PostgresConnector::new(config).unwrap();
        connector.connect().await.unwrap();

        let result = connector
            .execute_query("SELECT 1 AS n, 'x' AS s", None)
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["n", "s"]);
        assert!(result.is_consistent());

        connector.close().await.unwrap();
    }
}
