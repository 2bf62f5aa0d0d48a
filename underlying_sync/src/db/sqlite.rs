//! Local SQLite target through diesel.
//!
//! The reference table is created on first use with the same 21 columns,
//! keyed by `StockID` and `Start_date` so by-date snapshots of the same
//! stock can coexist.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::{
    Connection, RunQueryDsl, SqliteConnection,
    connection::SimpleConnection,
    sql_query,
    sql_types::{BigInt, Date, Nullable, Text},
    sqlite::Sqlite,
};
use tracing::{debug, info};

use crate::{
    db::{
        DbError, Destination, OpenError, ReferenceStore,
        statements::{Dialect, TableName, delete_statement, insert_statement},
    },
    loader::DeletePolicy,
    models::{DATE_COLUMNS, STOCK_ID_COLUMN, SqlValue, StockRecord, TARGET_COLUMNS},
};

/// Open a SQLite connection and apply connection-wide PRAGMAs: WAL
/// journaling, foreign keys on and a 5000ms busy timeout.
pub fn connect_sqlite(database_url: &str) -> Result<SqliteConnection, DbError> {
    let mut conn = SqliteConnection::establish(database_url)?;

    sql_query("PRAGMA journal_mode=WAL;").execute(&mut conn)?;
    sql_query("PRAGMA foreign_keys=ON;").execute(&mut conn)?;
    sql_query("PRAGMA busy_timeout=5000;").execute(&mut conn)?;
    Ok(conn)
}

/// `CREATE TABLE IF NOT EXISTS` for the reference table.
pub fn create_table_statement(table: &TableName) -> String {
    let dialect = Dialect::Sqlite;
    let columns = TARGET_COLUMNS
        .iter()
        .map(|&c| {
            let ty = if c == STOCK_ID_COLUMN {
                "BIGINT NOT NULL"
            } else if DATE_COLUMNS.contains(&c) {
                "DATE"
            } else {
                "TEXT"
            };
            format!("{} {ty}", dialect.quote(c))
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({columns}, PRIMARY KEY ({}, {}))",
        dialect.table(table),
        dialect.quote(STOCK_ID_COLUMN),
        dialect.quote(DATE_COLUMNS[0])
    )
}

pub fn ensure_table(conn: &mut SqliteConnection, table: &TableName) -> Result<(), DbError> {
    conn.batch_execute(&create_table_statement(table))?;
    Ok(())
}

pub struct SqliteStore {
    conn: SqliteConnection,
    in_transaction: bool,
}

impl SqliteStore {
    pub fn new(conn: SqliteConnection) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

#[async_trait]
impl ReferenceStore for SqliteStore {
    async fn begin(&mut self) -> Result<(), DbError> {
        self.conn.batch_execute("BEGIN IMMEDIATE")?;
        self.in_transaction = true;
        Ok(())
    }

    async fn delete_rows(
        &mut self,
        table: &TableName,
        policy: &DeletePolicy,
        load_date: NaiveDate,
    ) -> Result<u64, DbError> {
        let sql = delete_statement(Dialect::Sqlite, table, policy);
        debug!(%sql, "executing delete");
        let deleted = match policy {
            DeletePolicy::ByDate { .. } => sql_query(sql)
                .bind::<Date, _>(load_date)
                .execute(&mut self.conn)?,
            DeletePolicy::ReplaceAll => sql_query(sql).execute(&mut self.conn)?,
        };
        Ok(deleted as u64)
    }

    async fn insert_rows(&mut self, table: &TableName, rows: &[StockRecord]) -> Result<u64, DbError> {
        let mut written = 0;
        for batch in rows.chunks(Dialect::Sqlite.rows_per_statement()) {
            let mut query = sql_query(insert_statement(Dialect::Sqlite, table, batch.len()))
                .into_boxed::<Sqlite>();
            for value in batch.iter().flat_map(StockRecord::values) {
                query = match value {
                    SqlValue::Text(v) => query.bind::<Nullable<Text>, _>(v),
                    SqlValue::Date(v) => query.bind::<Nullable<Date>, _>(v),
                    SqlValue::BigInt(v) => query.bind::<BigInt, _>(v),
                };
            }
            let n = query.execute(&mut self.conn)? as u64;
            debug!(rows = batch.len(), written = n, "insert statement");
            written += n;
        }
        Ok(written)
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Err(DbError::NoTransaction("commit"));
        }
        self.conn.batch_execute("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        if !std::mem::take(&mut self.in_transaction) {
            return Ok(());
        }
        self.conn.batch_execute("ROLLBACK")?;
        Ok(())
    }
}

/// SQLite file target. Needs no credential.
#[derive(Debug, Clone)]
pub struct SqliteDestination {
    path: PathBuf,
    table: TableName,
}

impl SqliteDestination {
    pub fn new(path: impl Into<PathBuf>, table: TableName) -> Self {
        Self {
            path: path.into(),
            table,
        }
    }
}

#[async_trait]
impl Destination for SqliteDestination {
    async fn open(&self) -> Result<Box<dyn ReferenceStore>, OpenError> {
        let mut conn = connect_sqlite(&self.path.to_string_lossy())?;
        ensure_table(&mut conn, &self.table)?;
        info!(path = %self.path.display(), table = %self.table, "opened SQLite target");
        Ok(Box::new(SqliteStore::new(conn)))
    }
}
