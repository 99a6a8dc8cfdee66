//! Connector registry and database adapters for Manifold
//!
//! This crate defines the uniform connector contract every backend adapter
//! implements, the process-wide dialect registry that resolves configured
//! namespaces to adapters, and the builtin sqlx-based MySQL and PostgreSQL
//! adapters.

pub mod bind;
pub mod manager;
pub mod mysql;
pub mod postgres;
pub mod registry;
pub mod traits;

pub use manager::ConnectorManager;
pub use mysql::MySqlConnector;
pub use postgres::PostgresConnector;
pub use registry::{global, register_builtins, ConnectorFactory, ConnectorRegistry};
pub use traits::{Connector, Params, QueryCancellation};
