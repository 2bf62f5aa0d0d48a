//! Tabular result of a vendor request.

use indexmap::IndexMap;

use crate::models::cell::CellValue;

/// One vendor record: column name to value, in payload order.
pub type Record = IndexMap<String, CellValue>;

/// Ordered records plus the union of their column names in first-seen order.
///
/// The column set is whatever the vendor sent; consumers decide which
/// columns they need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row set from `records`, deriving the column list.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.push(record);
        }
        set
    }

    /// Appends a record, registering any column not seen before.
    pub fn push(&mut self, record: Record) {
        for name in record.keys() {
            if !self.has_column(name) {
                self.columns.push(name.clone());
            }
        }
        self.records.push(record);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Renames column `from` to `to` in the column list and every record.
    ///
    /// Returns `false` (and changes nothing) when `from` is absent or `to`
    /// already exists.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if from == to || self.has_column(to) {
            return false;
        }
        let Some(slot) = self.columns.iter_mut().find(|c| c.as_str() == from) else {
            return false;
        };
        *slot = to.to_string();

        for record in &mut self.records {
            if let Some(value) = record.shift_remove(from) {
                record.insert(to.to_string(), value);
            }
        }
        true
    }
}
