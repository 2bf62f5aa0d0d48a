//! A single value in a vendor result set.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// One cell of a [`RowSet`](crate::models::RowSet).
///
/// Vendors disagree on types (JSON gives numbers, CSV gives strings), so the
/// cell keeps whatever the payload carried and leaves coercion to the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Text rendering used when the destination column is character data.
    ///
    /// `Null` stays `None`. Booleans render as `1`/`0` so they land cleanly
    /// in bit-like columns.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            CellValue::Integer(i) => Some(i.to_string()),
            CellValue::Float(f) => Some(f.to_string()),
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Maps a decoded JSON value onto a cell. Arrays and objects are kept as
    /// their JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => CellValue::Integer(i),
                None => n.as_f64().map_or(CellValue::Null, CellValue::Float),
            },
            Value::String(s) => CellValue::Text(s),
            other @ (Value::Array(_) | Value::Object(_)) => CellValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_numbers_keep_integer_precision() {
        assert_eq!(CellValue::from_json(json!(42)), CellValue::Integer(42));
        assert_eq!(CellValue::from_json(json!(1.5)), CellValue::Float(1.5));
        assert_eq!(
            CellValue::from_json(json!(u64::MAX)),
            CellValue::Float(u64::MAX as f64)
        );
    }

    #[test]
    fn nested_json_becomes_text() {
        let cell = CellValue::from_json(json!({"a": [1, 2]}));
        assert_eq!(cell, CellValue::Text(r#"{"a":[1,2]}"#.to_string()));
    }

    #[test]
    fn text_rendering() {
        assert_eq!(CellValue::Null.to_text(), None);
        assert_eq!(CellValue::Bool(true).to_text().as_deref(), Some("1"));
        assert_eq!(CellValue::Float(2.0).to_text().as_deref(), Some("2"));
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(CellValue::Date(d).to_text().as_deref(), Some("2024-03-01"));
    }
}
