//! Vendor rows to destination rows.
//!
//! [`normalize`] is pure: it renames vendor columns, projects every record
//! onto [`TARGET_COLUMNS`](crate::models::TARGET_COLUMNS), coerces the date
//! columns and settles the `StockID` surrogate key. It runs before any
//! connection is opened so that bad data never costs a delete.
//!
//! `StockID` rules:
//! - absent, or null/blank in every row: ids `1..=N` are assigned in row order;
//! - otherwise every row must carry a distinct integer-convertible id. Rows
//!   that don't are reported together in [`NormalizeError::InvalidStockIds`].

pub mod coerce;
pub mod columns;

use std::collections::{BTreeSet, HashSet};

use underlying_ingestor::models::{CellValue, Record, RowSet};

use crate::models::{DATE_COLUMNS, STOCK_ID_COLUMN, StockRecord, TARGET_COLUMNS};
use coerce::{coerce_date, coerce_integer, is_blank};
use columns::rename_columns;

/// A `StockID` value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStockId {
    /// Zero-based row index in vendor order.
    pub row: usize,
    /// The offending value as text (`null` for blanks).
    pub value: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("StockID validation failed: {}", summarize(.invalid, .duplicates))]
    InvalidStockIds {
        invalid: Vec<InvalidStockId>,
        duplicates: Vec<i64>,
    },
}

fn summarize(invalid: &[InvalidStockId], duplicates: &[i64]) -> String {
    const SHOWN: usize = 10;
    let mut parts = Vec::new();
    if !invalid.is_empty() {
        let shown: Vec<String> = invalid
            .iter()
            .take(SHOWN)
            .map(|i| format!("row {} = {}", i.row, i.value))
            .collect();
        let more = invalid.len().saturating_sub(SHOWN);
        let suffix = if more > 0 { format!(" and {more} more") } else { String::new() };
        parts.push(format!(
            "{} unconvertible value(s) [{}]{suffix}",
            invalid.len(),
            shown.join(", ")
        ));
    }
    if !duplicates.is_empty() {
        parts.push(format!("duplicate id(s) {duplicates:?}"));
    }
    parts.join("; ")
}

/// What normalization did to the vendor columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// `(vendor name, destination name)` pairs that were renamed.
    pub renamed: Vec<(String, String)>,
    /// Destination columns the vendor did not send (loaded as null).
    pub missing: Vec<&'static str>,
    /// Vendor columns that are not part of the destination table.
    pub dropped: Vec<String>,
    /// Non-blank date cells that could not be parsed and were nulled.
    pub nulled_dates: usize,
    /// Whether `StockID` values were generated.
    pub synthesized_ids: bool,
}

/// Normalized rows plus the report describing how they were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub records: Vec<StockRecord>,
    pub report: NormalizeReport,
}

/// Turns a vendor row set into destination rows.
pub fn normalize(mut rows: RowSet) -> Result<Normalized, NormalizeError> {
    let renamed = rename_columns(&mut rows);

    let missing: Vec<&'static str> = TARGET_COLUMNS
        .iter()
        .copied()
        .filter(|c| !rows.has_column(c))
        .collect();
    let dropped: Vec<String> = rows
        .columns()
        .iter()
        .filter(|c| !TARGET_COLUMNS.contains(&c.as_str()))
        .cloned()
        .collect();

    let records = rows.into_records();
    let (ids, synthesized_ids) = resolve_stock_ids(&records)?;

    let mut nulled_dates = 0;
    let mut date = |record: &Record, column: &str| -> Option<chrono::NaiveDate> {
        let cell = record.get(column)?;
        let parsed = coerce_date(cell);
        if parsed.is_none() && !is_blank(cell) {
            nulled_dates += 1;
        }
        parsed
    };
    let text = |record: &Record, column: &str| record.get(column).and_then(CellValue::to_text);

    let records = records
        .iter()
        .zip(ids)
        .map(|(r, stock_id)| StockRecord {
            status: text(r, "Status"),
            stock_ticker: text(r, "Stock_ticker"),
            company_name: text(r, "Company_name"),
            exchange_mic: text(r, "Exchange_MIC"),
            exchange_name: text(r, "Exchange_name"),
            start_date: date(r, DATE_COLUMNS[0]),
            end_date: date(r, DATE_COLUMNS[1]),
            region: text(r, "Region"),
            security_type: text(r, "Security_type"),
            isin: text(r, "ISIN"),
            cusip: text(r, "CUSIP"),
            sedol: text(r, "SEDOL"),
            figi: text(r, "FIGI"),
            options: text(r, "Options"),
            opt_exchange_mic: text(r, "Opt_exchange_MIC"),
            opt_exchange_name: text(r, "Opt_exchange_name"),
            start_opt_date: date(r, DATE_COLUMNS[2]),
            end_opt_date: date(r, DATE_COLUMNS[3]),
            dividend_convention: text(r, "Dividend_Convention"),
            stock_id,
            blmb_ticker: text(r, "BLMB_ticker"),
        })
        .collect();

    Ok(Normalized {
        records,
        report: NormalizeReport {
            renamed,
            missing,
            dropped,
            nulled_dates,
            synthesized_ids,
        },
    })
}

/// Returns one id per record and whether they were generated.
fn resolve_stock_ids(records: &[Record]) -> Result<(Vec<i64>, bool), NormalizeError> {
    let cells: Vec<Option<&CellValue>> = records.iter().map(|r| r.get(STOCK_ID_COLUMN)).collect();

    if cells.iter().all(|c| c.is_none_or(is_blank)) {
        return Ok(((1..).take(records.len()).collect(), true));
    }

    let mut ids = Vec::with_capacity(cells.len());
    let mut invalid = Vec::new();
    let mut seen = HashSet::with_capacity(cells.len());
    let mut duplicates = BTreeSet::new();

    for (row, cell) in cells.into_iter().enumerate() {
        match cell.and_then(coerce_integer) {
            Some(id) => {
                if !seen.insert(id) {
                    duplicates.insert(id);
                }
                ids.push(id);
            }
            None => invalid.push(InvalidStockId {
                row,
                value: cell.map_or_else(|| "null".to_string(), ToString::to_string),
            }),
        }
    }

    if invalid.is_empty() && duplicates.is_empty() {
        Ok((ids, false))
    } else {
        Err(NormalizeError::InvalidStockIds {
            invalid,
            duplicates: duplicates.into_iter().collect(),
        })
    }
}
