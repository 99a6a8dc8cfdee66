//! Statement preparation helpers
//!
//! Named-placeholder expansion and session-option rendering shared by the
//! sqlx-based adapters. Bind values always travel through the driver;
//! nothing here interpolates user data into statement text.

use manifold_core::ManifoldError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::traits::Params;

/// Placeholder syntax of the target backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// MySQL-style `?`
    QuestionMark,
    /// PostgreSQL-style `$1`, `$2`, ...
    Numbered,
}

/// Regex pattern for session option keys (e.g. `sql_mode`, `spark.app.name`)
static SESSION_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").unwrap());

/// Rewrite `:name` placeholders to the backend's native syntax and collect
/// the bind values in occurrence order.
///
/// String literals, quoted identifiers, and `::type` casts are left
/// untouched. A placeholder with no matching entry in `params` is a
/// validation error. Repeated placeholders bind their value once per
/// occurrence.
pub fn expand_named(
    sql: &str,
    params: &Params,
    style: PlaceholderStyle,
) -> Result<(String, Vec<serde_json::Value>), ManifoldError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut values: Vec<serde_json::Value> = Vec::new();
    let mut in_quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(quote) = in_quote {
            out.push(c);
            if c == quote {
                // A doubled quote re-enters the literal on the next char.
                in_quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                in_quote = Some(c);
                out.push(c);
                i += 1;
            }
            ':' if i + 1 < chars.len() && chars[i + 1] == ':' => {
                out.push_str("::");
                i += 2;
            }
            ':' if i + 1 < chars.len()
                && (chars[i + 1].is_ascii_alphabetic() || chars[i + 1] == '_') =>
            {
                let start = i + 1;
                let mut end = start;
                while end < chars.len()
                    && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let value = params.get(&name).ok_or_else(|| {
                    ManifoldError::Validation(format!("missing bind parameter ':{}'", name))
                })?;
                values.push(value.clone());
                match style {
                    PlaceholderStyle::QuestionMark => out.push('?'),
                    PlaceholderStyle::Numbered => {
                        out.push('$');
                        out.push_str(&values.len().to_string());
                    }
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok((out, values))
}

/// Render a config's options map into deterministic `SET` statements,
/// one per option, ordered by key. `scope` is the statement prefix
/// (`SET SESSION` for MySQL, `SET` for PostgreSQL).
pub fn session_statements(
    options: &std::collections::HashMap<String, serde_json::Value>,
    scope: &str,
) -> Result<Vec<String>, ManifoldError> {
    let ordered: BTreeMap<&String, &serde_json::Value> = options.iter().collect();

    let mut statements = Vec::with_capacity(ordered.len());
    for (key, value) in ordered {
        if !SESSION_KEY_PATTERN.is_match(key) {
            return Err(ManifoldError::Validation(format!(
                "invalid session option name: '{}'",
                key
            )));
        }
        statements.push(format!("{} {} = {}", scope, key, render_literal(value)));
    }
    Ok(statements)
}

/// Render an option value as a safe SQL literal. Booleans and nulls are
/// normalized to strings the way session variables expect them.
fn render_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "''".to_string(),
        serde_json::Value::Bool(b) => format!("'{}'", b),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}
