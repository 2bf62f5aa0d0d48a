//! Decoding of underlying-info payloads.
//!
//! The API answers either with JSON (a bare array of records, or an object
//! wrapping them under `data` next to a `status` block) or with CSV text.
//! Both shapes end up as a [`RowSet`].

use serde::Deserialize;
use serde_json::Value;

use crate::{
    models::{CellValue, Record, RowSet},
    providers::{ApiSnafu, DecodeSnafu, ProviderError},
};

/// The `status` block that accompanies JSON payloads.
#[derive(Deserialize, Debug, Default)]
pub struct VendorStatus {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl VendorStatus {
    fn is_error(&self) -> bool {
        match self.code.as_deref() {
            None => false,
            Some(code) => !matches!(
                code.trim().to_ascii_uppercase().as_str(),
                "" | "OK" | "SUCCESS" | "COMPLETE" | "200"
            ),
        }
    }
}

/// Decodes a successful response body.
///
/// `content_type` decides the format when present; otherwise the first
/// non-blank character does (`[`/`{` means JSON, anything else CSV).
pub fn parse_body(content_type: Option<&str>, body: &str) -> Result<RowSet, ProviderError> {
    let trimmed = body.trim_start();
    if trimmed.is_empty() {
        return Ok(RowSet::new());
    }

    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if content_type.contains("json") {
        parse_json(body)
    } else if content_type.contains("csv") {
        parse_csv(body)
    } else if trimmed.starts_with('[') || trimmed.starts_with('{') {
        parse_json(body)
    } else {
        parse_csv(body)
    }
}

fn parse_json(body: &str) -> Result<RowSet, ProviderError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        DecodeSnafu {
            message: format!("invalid JSON: {e}"),
        }
        .build()
    })?;

    match value {
        Value::Array(items) => records_from_json(items),
        Value::Object(mut object) => {
            let status = match object.remove("status") {
                Some(status @ Value::Object(_)) => {
                    serde_json::from_value::<VendorStatus>(status).unwrap_or_default()
                }
                _ => VendorStatus::default(),
            };

            match object.remove("data") {
                Some(Value::Array(items)) => records_from_json(items),
                Some(Value::Null) | None if status.is_error() => ApiSnafu {
                    status: 200u16,
                    message: status
                        .message
                        .or(status.code)
                        .unwrap_or_else(|| "vendor reported an error".to_string()),
                }
                .fail(),
                Some(Value::Null) => Ok(RowSet::new()),
                None if status.code.is_some() => Ok(RowSet::new()),
                None => DecodeSnafu {
                    message: "JSON object has neither `data` nor `status`",
                }
                .fail(),
                Some(other) => DecodeSnafu {
                    message: format!("`data` is not an array but {}", json_kind(&other)),
                }
                .fail(),
            }
        }
        other => DecodeSnafu {
            message: format!("expected an array or object, got {}", json_kind(&other)),
        }
        .fail(),
    }
}

fn records_from_json(items: Vec<Value>) -> Result<RowSet, ProviderError> {
    let mut rows = RowSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(fields) = item else {
            return DecodeSnafu {
                message: format!("record {index} is {}, not an object", json_kind(&item)),
            }
            .fail();
        };
        let record: Record = fields
            .into_iter()
            .map(|(name, value)| (name, CellValue::from_json(value)))
            .collect();
        rows.push(record);
    }
    Ok(rows)
}

fn parse_csv(body: &str) -> Result<RowSet, ProviderError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| {
            DecodeSnafu {
                message: format!("invalid CSV header: {e}"),
            }
            .build()
        })?
        .clone();

    let mut rows = RowSet::new();
    for (index, result) in reader.records().enumerate() {
        let line = result.map_err(|e| {
            DecodeSnafu {
                message: format!("invalid CSV record {index}: {e}"),
            }
            .build()
        })?;
        let record: Record = headers
            .iter()
            .zip(line.iter())
            .map(|(name, raw)| {
                let cell = if raw.is_empty() {
                    CellValue::Null
                } else {
                    CellValue::Text(raw.to_string())
                };
                (name.to_string(), cell)
            })
            .collect();
        rows.push(record);
    }
    Ok(rows)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
