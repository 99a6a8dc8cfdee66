//! Connector trait definition

use async_trait::async_trait;
use manifold_core::ManifoldError;
use manifold_types::{ColumnSchema, ExecuteSQLResult};
use std::collections::HashMap;

/// Named bind parameters for a statement
pub type Params = HashMap<String, serde_json::Value>;

/// The uniform contract every backend adapter implements.
///
/// A connector is bound to one dialect and owns at most one live session.
/// Construction only validates the configuration; the session is
/// established by `connect` or lazily on first use. All operations may
/// perform network I/O and apply no internal timeout or retry; callers
/// wrap them as needed.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish the underlying session.
    ///
    /// Idempotent on a connected instance, and reopens a closed one.
    /// Fails with a connection error when the endpoint is unreachable,
    /// authentication fails, or the database does not exist.
    async fn connect(&self) -> Result<(), ManifoldError>;

    /// Execute one statement and return a normalized result.
    ///
    /// Named `:param` placeholders in `sql` are rewritten to the backend's
    /// native placeholders and bound through the driver; values are never
    /// interpolated into the statement text. With `params` absent or
    /// empty, the statement is sent verbatim.
    async fn execute_query(
        &self,
        sql: &str,
        params: Option<&Params>,
    ) -> Result<ExecuteSQLResult, ManifoldError>;

    /// List databases/catalogs visible to the current credentials.
    /// Empty when none exist.
    async fn get_databases(&self) -> Result<Vec<String>, ManifoldError>;

    /// List tables in the given namespace.
    ///
    /// Fails with a not-found error when the database does not exist.
    /// Backends without schemas ignore `schema`.
    async fn get_tables(
        &self,
        database: &str,
        schema: Option<&str>,
    ) -> Result<Vec<String>, ManifoldError>;

    /// List views in the given namespace. Returns an empty list when the
    /// backend cannot enumerate views.
    async fn get_views(
        &self,
        database: &str,
        schema: Option<&str>,
    ) -> Result<Vec<String>, ManifoldError>;

    /// Describe the columns of one table, in ordinal order. Empty when the
    /// table does not exist.
    async fn get_schema(
        &self,
        database: &str,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnSchema>, ManifoldError>;

    /// Lightweight round-trip health check. Reports failure as `false`
    /// instead of an error.
    async fn test_connection(&self) -> bool;

    /// Release the underlying session. Idempotent; query operations on a
    /// closed connector fail with a connection error.
    async fn close(&self) -> Result<(), ManifoldError>;

    /// The connector's dialect tag.
    fn dialect(&self) -> &'static str;
}

/// Optional capability for backends that can cancel an in-flight
/// statement. Not part of the base contract; hosts must downcast or hold
/// the concrete type to use it.
#[async_trait]
pub trait QueryCancellation: Connector {
    /// Request cancellation of the currently running statement.
    async fn cancel(&self) -> Result<(), ManifoldError>;
}
