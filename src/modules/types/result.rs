//! Normalized query and introspection results

use serde::{Deserialize, Serialize};

/// Result of executing one statement, in the same shape for every backend.
///
/// Rows are positional: `rows[i][j]` is the value of column `columns[j]` in
/// the i-th result row. A failed execution carries the backend message in
/// `error` and no rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteSQLResult {
    /// Column names, in result order
    pub columns: Vec<String>,

    /// Result rows, each aligned to `columns`
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Number of rows returned
    pub row_count: usize,

    /// Backend error message, when execution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecuteSQLResult {
    /// Build a successful result; the row count is derived from `rows`.
    pub fn success(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            error: None,
        }
    }

    /// Build a failed result carrying the backend's error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            error: Some(message.into()),
        }
    }

    /// An empty successful result (no columns, no rows).
    pub fn empty() -> Self {
        Self::success(Vec::new(), Vec::new())
    }

    /// True when this result represents a failed execution.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Check the shape invariant: every row has exactly one value per
    /// column, the row count matches, and failures carry no rows.
    pub fn is_consistent(&self) -> bool {
        if self.row_count != self.rows.len() {
            return false;
        }
        if self.error.is_some() && !self.rows.is_empty() {
            return false;
        }
        self.rows.iter().all(|row| row.len() == self.columns.len())
    }
}

/// One column of an introspected table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Position within the table, starting at 0
    pub ordinal: u32,

    /// Column name
    pub name: String,

    /// Backend type name as reported by the catalog
    pub data_type: String,

    /// Column comment, when the backend records one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Whether NULL values are allowed
    pub nullable: bool,

    /// Whether the column is part of the primary key
    pub primary_key: bool,

    /// Default value expression, when defined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_derives_row_count() {
        let result = ExecuteSQLResult::success(
            vec!["id".into(), "name".into()],
            vec![vec![json!(1), json!("a")], vec![json!(2), json!("b")]],
        );
        assert_eq!(result.row_count, 2);
        assert!(!result.is_failure());
        assert!(result.is_consistent());
    }

    #[test]
    fn test_failure_has_no_rows() {
        let result = ExecuteSQLResult::failure("syntax error near 'FORM'");
        assert!(result.is_failure());
        assert_eq!(result.row_count, 0);
        assert!(result.rows.is_empty());
        assert!(result.is_consistent());
    }

    #[test]
    fn test_misaligned_rows_are_inconsistent() {
        let result = ExecuteSQLResult::success(
            vec!["id".into(), "name".into()],
            vec![vec![json!(1)]],
        );
        assert!(!result.is_consistent());
    }

    #[test]
    fn test_serde_skips_absent_error() {
        let result = ExecuteSQLResult::success(vec!["n".into()], vec![vec![json!(1)]]);
        let encoded = serde_json::to_string(&result).unwrap();
        assert!(!encoded.contains("error"));

        let failed = ExecuteSQLResult::failure("boom");
        let encoded = serde_json::to_string(&failed).unwrap();
        assert!(encoded.contains("\"error\":\"boom\""));
    }
}
