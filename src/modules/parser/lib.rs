//! Configuration parsing for Manifold
//!
//! Turns a YAML profile (a named map of connection namespaces) into the
//! core domain model, with `{{ env.VAR }}` substitution and validation.

pub mod env;
pub mod validator;
pub mod yaml;

pub use env::EnvSubstitutor;
pub use validator::ProfileValidator;
pub use yaml::YamlParser;
