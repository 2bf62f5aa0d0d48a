//! SQL text for the two statements the loader issues.
//!
//! Identifiers are always quoted for the target dialect; values are always
//! bound parameters.

use std::fmt;

use crate::{
    loader::DeletePolicy,
    models::{COLUMN_COUNT, TARGET_COLUMNS},
};

/// A validated, possibly schema-qualified table name such as `dbo.UnderlyingInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    parts: Vec<String>,
}

impl TableName {
    /// Parses `name`, accepting up to three dot-separated parts, each
    /// optionally wrapped in `[...]` or `"..."`. Inside a wrapped part a dot
    /// is literal and the closing character is escaped by doubling it.
    pub fn parse(name: &str) -> Result<Self, String> {
        let mut parts = Vec::new();
        let mut chars = name.trim().chars().peekable();

        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            let part = match chars.peek() {
                Some(&(open @ ('[' | '"'))) => {
                    chars.next();
                    let close = if open == '[' { ']' } else { '"' };
                    let mut part = String::new();
                    loop {
                        match chars.next() {
                            Some(c) if c == close => {
                                if chars.next_if_eq(&close).is_some() {
                                    part.push(close);
                                } else {
                                    break;
                                }
                            }
                            Some(c) => part.push(c),
                            None => return Err(format!("{name:?} has an unterminated {open}")),
                        }
                    }
                    while chars.next_if(|c| c.is_whitespace()).is_some() {}
                    part
                }
                _ => {
                    let mut part = String::new();
                    while let Some(c) = chars.next_if(|&c| c != '.') {
                        if matches!(c, '[' | ']' | '"') {
                            return Err(format!("{name:?} contains stray quoting characters"));
                        }
                        part.push(c);
                    }
                    part.trim_end().to_string()
                }
            };

            if part.is_empty() {
                return Err(format!("{name:?} contains an empty name part"));
            }
            if part.chars().any(char::is_control) {
                return Err(format!("{name:?} contains control characters"));
            }
            parts.push(part);

            match chars.next() {
                None => break,
                Some('.') => {}
                Some(c) => return Err(format!("{name:?} has {c:?} after a quoted part")),
            }
        }

        if parts.len() > 3 {
            return Err(format!("{name:?} has more than three name parts"));
        }
        Ok(Self { parts })
    }

    /// The unqualified object name (last part).
    pub fn object(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

/// SQL flavour of a store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SQL Server / Azure SQL (tiberius).
    Mssql,
    /// SQLite (diesel).
    Sqlite,
}

impl Dialect {
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::Mssql => format!("[{}]", ident.replace(']', "]]")),
            Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Fully quoted table reference. SQLite has no schemas, so only the
    /// object name is used there.
    pub fn table(self, table: &TableName) -> String {
        match self {
            Dialect::Mssql => table
                .parts()
                .iter()
                .map(|p| self.quote(p))
                .collect::<Vec<_>>()
                .join("."),
            Dialect::Sqlite => self.quote(table.object()),
        }
    }

    /// Placeholder for the `n`-th (1-based) bind parameter.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Mssql => format!("@P{n}"),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Bind parameters we allow in one statement. SQL Server caps a request
    /// at 2100; SQLite (3.32+) at 32766.
    pub const fn parameter_budget(self) -> usize {
        match self {
            Dialect::Mssql => 2000,
            Dialect::Sqlite => 32_000,
        }
    }

    /// Rows per multi-row `INSERT` that stay within the parameter budget.
    /// SQL Server additionally caps a `VALUES` list at 1000 rows.
    pub const fn rows_per_statement(self) -> usize {
        let rows = self.parameter_budget() / COLUMN_COUNT;
        if rows > 1000 { 1000 } else { rows }
    }
}

/// `DELETE` for `policy`. `ByDate` binds the load date as parameter 1.
pub fn delete_statement(dialect: Dialect, table: &TableName, policy: &DeletePolicy) -> String {
    let table = dialect.table(table);
    match policy {
        DeletePolicy::ByDate { column } => format!(
            "DELETE FROM {table} WHERE {} = {}",
            dialect.quote(column),
            dialect.placeholder(1)
        ),
        DeletePolicy::ReplaceAll => format!("DELETE FROM {table}"),
    }
}

/// Multi-row `INSERT` of `rows` records over the fixed column list.
pub fn insert_statement(dialect: Dialect, table: &TableName, rows: usize) -> String {
    let columns = TARGET_COLUMNS
        .iter()
        .map(|c| dialect.quote(c))
        .collect::<Vec<_>>()
        .join(", ");

    let tuples = (0..rows)
        .map(|row| {
            let params = (1..=COLUMN_COUNT)
                .map(|col| dialect.placeholder(row * COLUMN_COUNT + col))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({params})")
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({columns}) VALUES {tuples}",
        dialect.table(table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names() {
        let t = TableName::parse("dbo.UnderlyingInfo").unwrap();
        assert_eq!(t.parts(), ["dbo", "UnderlyingInfo"]);
        assert_eq!(t.object(), "UnderlyingInfo");
        assert_eq!(t.to_string(), "dbo.UnderlyingInfo");

        let t = TableName::parse("[my db].[dbo].[Equity Info]").unwrap();
        assert_eq!(t.parts(), ["my db", "dbo", "Equity Info"]);

        let t = TableName::parse("[my.schema].Info").unwrap();
        assert_eq!(t.parts(), ["my.schema", "Info"]);
        assert_eq!(Dialect::Mssql.table(&t), "[my.schema].[Info]");

        let t = TableName::parse("[a]]b].\"c\"\"d\"").unwrap();
        assert_eq!(t.parts(), ["a]b", "c\"d"]);

        for bad in [
            "",
            "a..b",
            "a.",
            "a.b.c.d",
            "x]; DROP TABLE y; --",
            "\"a\"b\"",
            "[open.Info",
            "[]",
        ] {
            assert!(TableName::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn quoting_per_dialect() {
        let t = TableName::parse("dbo.Info").unwrap();
        assert_eq!(Dialect::Mssql.table(&t), "[dbo].[Info]");
        assert_eq!(Dialect::Sqlite.table(&t), "\"Info\"");
        assert_eq!(Dialect::Mssql.quote("a]b"), "[a]]b]");
        assert_eq!(Dialect::Sqlite.quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn delete_statements() {
        let t = TableName::parse("Info").unwrap();
        let by_date = DeletePolicy::ByDate {
            column: "Start_date".into(),
        };
        assert_eq!(
            delete_statement(Dialect::Mssql, &t, &by_date),
            "DELETE FROM [Info] WHERE [Start_date] = @P1"
        );
        assert_eq!(
            delete_statement(Dialect::Sqlite, &t, &by_date),
            "DELETE FROM \"Info\" WHERE \"Start_date\" = ?"
        );
        assert_eq!(
            delete_statement(Dialect::Mssql, &t, &DeletePolicy::ReplaceAll),
            "DELETE FROM [Info]"
        );
    }

    #[test]
    fn insert_numbers_parameters_across_rows() {
        let t = TableName::parse("Info").unwrap();
        let sql = insert_statement(Dialect::Mssql, &t, 2);

        assert!(sql.starts_with("INSERT INTO [Info] ([Status], [Stock_ticker], "));
        assert!(sql.contains("[StockID], [BLMB_ticker]) VALUES (@P1, "));
        assert!(sql.contains("@P21), (@P22, "));
        assert!(sql.ends_with("@P42)"));

        let sql = insert_statement(Dialect::Sqlite, &t, 3);
        assert_eq!(sql.matches('?').count(), 3 * COLUMN_COUNT);
    }

    #[test]
    fn statement_sizes_respect_driver_limits() {
        assert_eq!(Dialect::Mssql.rows_per_statement(), 95);
        assert!(Dialect::Mssql.rows_per_statement() * COLUMN_COUNT <= 2100);
        assert_eq!(Dialect::Sqlite.rows_per_statement(), 1000);
    }
}
