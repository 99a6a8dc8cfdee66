//! Dialect naming conventions
//!
//! A dialect is the string identifier of a database backend ("mysql",
//! "postgres", ...). The registry is keyed by normalized dialect names so
//! adapters can be added without touching this crate; the constants below
//! cover the builtin adapters only.

/// Dialect name of the builtin MySQL adapter.
pub const MYSQL: &str = "mysql";

/// Dialect name of the builtin PostgreSQL adapter.
pub const POSTGRES: &str = "postgres";

/// Normalize a dialect name for use as a registry key.
///
/// Names are compared case-insensitively and with surrounding whitespace
/// ignored, so `"MySQL "` and `"mysql"` address the same registration.
pub fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Check whether a name is a well-formed dialect tag
/// (lowercase alphanumeric with underscores, starting with a letter).
pub fn is_well_formed(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
