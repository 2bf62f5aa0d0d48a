//! Vendor column names to destination column names.

use underlying_ingestor::models::RowSet;

/// Vendor spellings (with spaces) and their destination names.
pub const COLUMN_RENAMES: [(&str, &str); 14] = [
    ("Stock ticker", "Stock_ticker"),
    ("Company name", "Company_name"),
    ("Exchange MIC", "Exchange_MIC"),
    ("Exchange name", "Exchange_name"),
    ("Start date", "Start_date"),
    ("End date", "End_date"),
    ("Security type", "Security_type"),
    ("Opt exchange MIC", "Opt_exchange_MIC"),
    ("Opt exchange name", "Opt_exchange_name"),
    ("Start opt date", "Start_opt_date"),
    ("End opt date", "End_opt_date"),
    ("Dividend Convention", "Dividend_Convention"),
    ("Stock ID", "StockID"),
    ("BLMB ticker", "BLMB_ticker"),
];

/// Applies [`COLUMN_RENAMES`] to `rows` and returns the renames performed.
///
/// A vendor column whose destination name is already present is left alone
/// (and later dropped as an extra), so running this twice is a no-op.
pub fn rename_columns(rows: &mut RowSet) -> Vec<(String, String)> {
    COLUMN_RENAMES
        .iter()
        .filter(|(from, to)| rows.rename_column(from, to))
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}
