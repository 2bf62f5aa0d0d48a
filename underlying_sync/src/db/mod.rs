//! Destination stores.
//!
//! - [`mssql`]: SQL Server / Azure SQL through tiberius, authenticated with
//!   an Azure AD token.
//! - [`sqlite`]: a local SQLite file through diesel, for development runs.
//!
//! Both implement [`ReferenceStore`], the transactional surface the loader
//! needs, and are opened through a [`Destination`].

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    auth::AuthError, db::statements::TableName, loader::DeletePolicy, models::StockRecord,
};

pub mod mssql;
pub mod sqlite;
pub mod statements;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] diesel::result::Error),

    #[error("failed to open SQLite database: {0}")]
    SqliteConnect(#[from] diesel::ConnectionError),

    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid DB_SERVER {server:?}: {reason}")]
    InvalidServer { server: String, reason: String },

    #[error("{0} was called outside a transaction")]
    NoTransaction(&'static str),
}

/// Transactional writes against the reference table.
///
/// `rollback` without an open transaction is a no-op so callers can always
/// call it on their error path.
#[async_trait]
pub trait ReferenceStore: Send {
    async fn begin(&mut self) -> Result<(), DbError>;

    /// Deletes the rows the policy selects and returns how many went.
    async fn delete_rows(
        &mut self,
        table: &TableName,
        policy: &DeletePolicy,
        load_date: NaiveDate,
    ) -> Result<u64, DbError>;

    /// Inserts `rows` and returns the number written.
    async fn insert_rows(&mut self, table: &TableName, rows: &[StockRecord]) -> Result<u64, DbError>;

    async fn commit(&mut self) -> Result<(), DbError>;

    async fn rollback(&mut self) -> Result<(), DbError>;
}

/// Errors from opening a destination: getting the token or connecting.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Where a store comes from. Opening may authenticate and connect, so the
/// pipeline only does it once it has rows to write.
#[async_trait]
pub trait Destination: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ReferenceStore>, OpenError>;
}
