//! Destination row model.
//!
//! The destination table has a fixed shape: the 21 columns in
//! [`TARGET_COLUMNS`], in that order. [`StockRecord`] is one row of it and
//! [`StockRecord::values`] yields the bind values in column order, which is
//! what both store backends rely on when they build their `INSERT`s.

use chrono::NaiveDate;

/// Number of destination columns.
pub const COLUMN_COUNT: usize = 21;

/// Destination columns, in table order.
pub const TARGET_COLUMNS: [&str; COLUMN_COUNT] = [
    "Status",
    "Stock_ticker",
    "Company_name",
    "Exchange_MIC",
    "Exchange_name",
    "Start_date",
    "End_date",
    "Region",
    "Security_type",
    "ISIN",
    "CUSIP",
    "SEDOL",
    "FIGI",
    "Options",
    "Opt_exchange_MIC",
    "Opt_exchange_name",
    "Start_opt_date",
    "End_opt_date",
    "Dividend_Convention",
    "StockID",
    "BLMB_ticker",
];

/// Columns stored as dates.
pub const DATE_COLUMNS: [&str; 4] = ["Start_date", "End_date", "Start_opt_date", "End_opt_date"];

/// Surrogate key column.
pub const STOCK_ID_COLUMN: &str = "StockID";

/// A bind value for one destination cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(Option<String>),
    Date(Option<NaiveDate>),
    BigInt(i64),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Text(None) | SqlValue::Date(None))
    }
}

/// One destination row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StockRecord {
    pub status: Option<String>,
    pub stock_ticker: Option<String>,
    pub company_name: Option<String>,
    pub exchange_mic: Option<String>,
    pub exchange_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub region: Option<String>,
    pub security_type: Option<String>,
    pub isin: Option<String>,
    pub cusip: Option<String>,
    pub sedol: Option<String>,
    pub figi: Option<String>,
    pub options: Option<String>,
    pub opt_exchange_mic: Option<String>,
    pub opt_exchange_name: Option<String>,
    pub start_opt_date: Option<NaiveDate>,
    pub end_opt_date: Option<NaiveDate>,
    pub dividend_convention: Option<String>,
    pub stock_id: i64,
    pub blmb_ticker: Option<String>,
}

impl StockRecord {
    /// Value of one of the [`DATE_COLUMNS`], `None` for any other name.
    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        match column {
            "Start_date" => self.start_date,
            "End_date" => self.end_date,
            "Start_opt_date" => self.start_opt_date,
            "End_opt_date" => self.end_opt_date,
            _ => None,
        }
    }

    pub fn date_mut(&mut self, column: &str) -> Option<&mut Option<NaiveDate>> {
        match column {
            "Start_date" => Some(&mut self.start_date),
            "End_date" => Some(&mut self.end_date),
            "Start_opt_date" => Some(&mut self.start_opt_date),
            "End_opt_date" => Some(&mut self.end_opt_date),
            _ => None,
        }
    }

    /// Bind values in [`TARGET_COLUMNS`] order.
    pub fn values(&self) -> [SqlValue; COLUMN_COUNT] {
        use SqlValue::{BigInt, Date, Text};

        [
            Text(self.status.clone()),
            Text(self.stock_ticker.clone()),
            Text(self.company_name.clone()),
            Text(self.exchange_mic.clone()),
            Text(self.exchange_name.clone()),
            Date(self.start_date),
            Date(self.end_date),
            Text(self.region.clone()),
            Text(self.security_type.clone()),
            Text(self.isin.clone()),
            Text(self.cusip.clone()),
            Text(self.sedol.clone()),
            Text(self.figi.clone()),
            Text(self.options.clone()),
            Text(self.opt_exchange_mic.clone()),
            Text(self.opt_exchange_name.clone()),
            Date(self.start_opt_date),
            Date(self.end_opt_date),
            Text(self.dividend_convention.clone()),
            BigInt(self.stock_id),
            Text(self.blmb_ticker.clone()),
        ]
    }
}
