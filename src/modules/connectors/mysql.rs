//! MySQL connector implementation

use async_trait::async_trait;
use manifold_core::{ConnectorConfig, ManifoldError, PoolConfig};
use manifold_types::{dialect, ColumnSchema, ExecuteSQLResult};
use sqlx::mysql::{MySqlColumn, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, TypeInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::bind::{self, PlaceholderStyle};
use crate::registry::ConnectorRegistry;
use crate::traits::{Connector, Params};

/// Schemas owned by the server rather than by users.
const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "mysql", "performance_schema", "sys"];

enum SessionState {
    Idle,
    Connected(MySqlPool),
    Closed,
}

/// MySQL database connector backed by a sqlx pool.
///
/// Construction validates the configuration without any network I/O; the
/// pool is built on `connect` or on first use. Safe for concurrent
/// callers: operations check out pooled connections independently.
pub struct MySqlConnector {
    config: ConnectorConfig,
    pool_config: PoolConfig,
    state: RwLock<SessionState>,
}

impl MySqlConnector {
    const DEFAULT_PORT: u16 = 3306;

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

    /// Get the live pool, establishing the session lazily on first use.
    /// A closed connector stays closed until `connect` is called again.
    async fn pool(&self) -> Result<MySqlPool, ManifoldError> {
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

    async fn open_pool(&self) -> Result<MySqlPool, ManifoldError> {
        let options = MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port.unwrap_or(Self::DEFAULT_PORT))
            .username(&self.config.username)
            .password(&self.config.password)
            .database(&self.config.database);

        let mut pool_options = MySqlPoolOptions::new()
            .max_connections(self.pool_config.max_connections)
            .min_connections(self.pool_config.min_connections)
            .acquire_timeout(Duration::from_secs(self.config.timeout_seconds))
            .idle_timeout(self.pool_config.idle_timeout())
            .max_lifetime(self.pool_config.max_lifetime());

        let session = bind::session_statements(&self.config.options, "SET SESSION")?;
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

        debug!(host = %self.config.host, database = %self.config.database, "connecting to MySQL");
        pool_options
            .connect_with(options)
            .await
            .map_err(|e| ManifoldError::Connection(format!("MySQL connection failed: {}", e)))
    }
}

/// Classify a driver error: transport-level failures mean the session is
/// gone; everything else is an execution failure with the backend message.
fn driver_error(e: sqlx::Error) -> ManifoldError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            ManifoldError::Connection(format!("MySQL connection lost: {}", e))
        }
        other => ManifoldError::Query(format!("MySQL query failed: {}", other)),
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    value: &serde_json::Value,
) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
    match value {
        serde_json::Value::Null => query.bind(None::<String>),
        serde_json::Value::Bool(b) => query.bind(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.clone()),
    }
}

fn rows_to_result(rows: &[MySqlRow]) -> ExecuteSQLResult {
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
fn column_value(row: &MySqlRow, column: &MySqlColumn) -> serde_json::Value {
    let type_name = column.type_info().name();
    let idx = column.ordinal();

    match type_name {
        "BOOLEAN" | "TINYINT(1)" => row
            .try_get::<bool, _>(idx)
            .map(serde_json::Value::Bool)
            .unwrap_or(serde_json::Value::Null),
        "TINYINT" | "SMALLINT" => row
            .try_get::<i16, _>(idx)
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "INT" | "MEDIUMINT" => row
            .try_get::<i32, _>(idx)
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "BIGINT" => row
            .try_get::<i64, _>(idx)
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "FLOAT" => row
            .try_get::<f32, _>(idx)
            .map(|v| {
                serde_json::Number::from_f64(v as f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            })
            .unwrap_or(serde_json::Value::Null),
        "DOUBLE" => row
            .try_get::<f64, _>(idx)
            .map(|v| {
                serde_json::Number::from_f64(v)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            })
            .unwrap_or(serde_json::Value::Null),
        "DATETIME" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(|v| serde_json::Value::String(v.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMP" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .map(|v| serde_json::Value::String(v.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(idx)
            .map(|v| serde_json::Value::String(v.to_string()))
            .unwrap_or(serde_json::Value::Null),
        "JSON" => row
            .try_get::<serde_json::Value, _>(idx)
            .unwrap_or(serde_json::Value::Null),
        _ => row
            .try_get::<String, _>(idx)
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    }
}

#[async_trait]
impl Connector for MySqlConnector {
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
            Some(p) if !p.is_empty() => bind::expand_named(sql, p, PlaceholderStyle::QuestionMark)?,
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
            sqlx::query("SELECT SCHEMA_NAME FROM information_schema.SCHEMATA ORDER BY SCHEMA_NAME")
                .fetch_all(&pool)
                .await
                .map_err(driver_error)?;

        let mut databases = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get(0).map_err(driver_error)?;
            let lowered = name.to_ascii_lowercase();
            if !SYSTEM_SCHEMAS.contains(&lowered.as_str()) {
                databases.push(name);
            }
        }
        Ok(databases)
    }

    async fn get_tables(
        &self,
        database: &str,
        _schema: Option<&str>,
    ) -> Result<Vec<String>, ManifoldError> {
        let pool = self.pool().await?;

        let exists = sqlx::query("SELECT 1 FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?")
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

        let rows = sqlx::query(
            "SELECT TABLE_NAME FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME",
        )
        .bind(database)
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
        _schema: Option<&str>,
    ) -> Result<Vec<String>, ManifoldError> {
        let pool = self.pool().await?;

        let result = sqlx::query(
            "SELECT TABLE_NAME FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'VIEW' ORDER BY TABLE_NAME",
        )
        .bind(database)
        .fetch_all(&pool)
        .await;

        match result {
            Ok(rows) => rows
                .iter()
                .map(|row| row.try_get::<String, _>(0).map_err(driver_error))
                .collect(),
            Err(e) => {
                warn!(database = %database, error = %e, "failed to list MySQL views");
                Ok(Vec::new())
            }
        }
    }

    async fn get_schema(
        &self,
        database: &str,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnSchema>, ManifoldError> {
        let pool = self.pool().await?;

        let rows = sqlx::query(
            "SELECT CAST(ORDINAL_POSITION AS SIGNED) AS ordinal, COLUMN_NAME, COLUMN_TYPE, \
             IS_NULLABLE, COLUMN_KEY, COLUMN_DEFAULT, COLUMN_COMMENT \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
        )
        .bind(database)
        .bind(table)
        .fetch_all(&pool)
        .await
        .map_err(driver_error)?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let ordinal: i64 = row.try_get("ordinal").map_err(driver_error)?;
            let name: String = row.try_get("COLUMN_NAME").map_err(driver_error)?;
            let data_type: String = row.try_get("COLUMN_TYPE").map_err(driver_error)?;
            let nullable: String = row.try_get("IS_NULLABLE").map_err(driver_error)?;
            let key: String = row.try_get("COLUMN_KEY").map_err(driver_error)?;
            let default_value: Option<String> =
                row.try_get("COLUMN_DEFAULT").map_err(driver_error)?;
            let comment: String = row.try_get("COLUMN_COMMENT").map_err(driver_error)?;

            columns.push(ColumnSchema {
                ordinal: ordinal.saturating_sub(1) as u32,
                name,
                data_type,
                comment: if comment.is_empty() {
                    None
                } else {
                    Some(comment)
                },
                nullable: nullable.eq_ignore_ascii_case("YES"),
                primary_key: key.eq_ignore_ascii_case("PRI"),
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
        dialect::MYSQL
    }
}

/// Adapter registration entry point: wires the `mysql` dialect factory,
/// called once from the host's initialization path.
pub fn register(registry: &ConnectorRegistry) -> Result<(), ManifoldError> {
    registry.register(
        dialect::MYSQL,
        Arc::new(|config| Ok(Arc::new(MySqlConnector::new(config)?) as Arc<dyn Connector>)),
    )
}
