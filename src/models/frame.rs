//! Raw tabular payload as returned by a provider, before standardization.
//!
//! Providers disagree on column naming (localized vs English) and cell
//! types (strings vs numbers), so the frame keeps column names verbatim and
//! cells as loose JSON values. The standardizer owns the mapping to the
//! canonical schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFrame {
    /// Column names exactly as the provider returned them
    pub columns: Vec<String>,
    /// Row-major cells, one `Vec<Value>` per row
    pub rows: Vec<Vec<Value>>,
    /// Provider-side error string embedded in an otherwise-valid response
    /// (some upstreams return 200 with an error body)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_marker: Option<String>,
}

impl RawFrame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            error_marker: None,
        }
    }

    /// Frame carrying only a provider-side error marker
    pub fn error(marker: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            error_marker: Some(marker.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of the first column whose name matches any alias (exact match,
    /// case-insensitive for ASCII names).
    pub fn find_column(&self, aliases: &[&str]) -> Option<usize> {
        self.columns.iter().position(|name| {
            aliases
                .iter()
                .any(|alias| name == alias || name.eq_ignore_ascii_case(alias))
        })
    }

    /// Cell accessor; `None` when the row or column is out of bounds
    pub fn cell(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }
}

/// Extract an f64 from a loose JSON cell (number, or numeric string with
/// optional '%' suffix as some quote endpoints return).
pub fn cell_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    }
}

/// Extract a string from a JSON cell
pub fn cell_as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_column_aliases() {
        let frame = RawFrame::new(vec![
            "日期".to_string(),
            "Open".to_string(),
            "收盘".to_string(),
        ]);
        assert_eq!(frame.find_column(&["date", "日期"]), Some(0));
        assert_eq!(frame.find_column(&["open", "开盘"]), Some(1));
        assert_eq!(frame.find_column(&["close", "收盘"]), Some(2));
        assert_eq!(frame.find_column(&["volume"]), None);
    }

    #[test]
    fn test_cell_access_and_bounds() {
        let mut frame = RawFrame::new(vec!["date".to_string(), "close".to_string()]);
        frame.push_row(vec![json!("2024-01-02"), json!(1695.0)]);

        assert_eq!(frame.cell(0, 1), Some(&json!(1695.0)));
        assert_eq!(frame.cell(0, 2), None); // column out of bounds
        assert_eq!(frame.cell(1, 0), None); // row out of bounds
    }

    #[test]
    fn test_cell_as_f64_variants() {
        assert_eq!(cell_as_f64(&json!(12.5)), Some(12.5));
        assert_eq!(cell_as_f64(&json!("12.5")), Some(12.5));
        assert_eq!(cell_as_f64(&json!("3.2%")), Some(3.2));
        assert_eq!(cell_as_f64(&json!(null)), None);
    }
}
