//! Core domain logic for Manifold
//!
//! This crate contains the connection configuration model, the namespace
//! configuration surface, and the error type shared by every Manifold crate.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::ManifoldError;
