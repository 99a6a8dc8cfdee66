//! Type definitions for Manifold
//!
//! This crate contains the shared type definitions used across the Manifold
//! codebase: dialect naming and the normalized query/introspection results.

pub mod dialect;
pub mod result;

pub use result::{ColumnSchema, ExecuteSQLResult};
