//! SQL Server / Azure SQL through tiberius.
//!
//! The connection is always encrypted with certificate validation on and
//! authenticated with an Azure AD access token; there is no password path.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::{
    auth::{AccessToken, DATABASE_SCOPE, TokenCredential},
    db::{
        DbError, Destination, OpenError, ReferenceStore,
        statements::{Dialect, TableName, delete_statement, insert_statement},
    },
    loader::DeletePolicy,
    models::{SqlValue, StockRecord},
};

pub const DEFAULT_PORT: u16 = 1433;

/// `DB_SERVER` split into host and port. Accepts `host`, `host,port` and
/// either form prefixed with `tcp:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn parse(server: &str) -> Result<Self, DbError> {
        let invalid = |reason: &str| DbError::InvalidServer {
            server: server.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = server.trim();
        let rest = match trimmed.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("tcp:") => &trimmed[4..],
            _ => trimmed,
        };

        let (host, port) = match rest.split_once(',') {
            Some((host, port)) => {
                let port = port
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| invalid("port is not a number between 0 and 65535"))?;
                (host.trim(), port)
            }
            None => (rest, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp:{},{}", self.host, self.port)
    }
}

/// ODBC-style description of the target, for logs. Carries no secret.
pub fn connection_string(address: &ServerAddress, database: &str) -> String {
    format!(
        "DRIVER={{ODBC Driver 18 for SQL Server}};SERVER={address};DATABASE={database};Encrypt=yes;TrustServerCertificate=no;"
    )
}

fn tiberius_config(address: &ServerAddress, database: &str, token: &AccessToken) -> Config {
    let mut config = Config::new();
    config.host(&address.host);
    config.port(address.port);
    config.database(database);
    config.authentication(AuthMethod::aad_token(token.secret()));
    config.encryption(EncryptionLevel::Required);
    config
}

type TdsClient = Client<Compat<TcpStream>>;

async fn open_client(config: Config) -> Result<TdsClient, tiberius::error::Error> {
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;
    Client::connect(config, tcp.compat_write()).await
}

/// Connects, following one gateway redirect.
pub async fn connect(
    address: &ServerAddress,
    database: &str,
    token: &AccessToken,
) -> Result<MssqlStore, DbError> {
    debug!(dsn = %connection_string(address, database), "connecting");

    let mut config = tiberius_config(address, database, token);
    let client = match open_client(config.clone()).await {
        Err(tiberius::error::Error::Routing { host, port }) => {
            debug!(%host, port, "following gateway redirect");
            config.host(&host);
            config.port(port);
            open_client(config).await?
        }
        other => other?,
    };

    info!(server = %address, database, "connected to SQL Server");
    Ok(MssqlStore {
        client,
        in_transaction: false,
    })
}

pub struct MssqlStore {
    client: TdsClient,
    in_transaction: bool,
}

impl MssqlStore {
    async fn batch(&mut self, sql: &str) -> Result<(), DbError> {
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }
}

#[async_trait]
impl ReferenceStore for MssqlStore {
    async fn begin(&mut self) -> Result<(), DbError> {
        self.batch("BEGIN TRANSACTION").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn delete_rows(
        &mut self,
        table: &TableName,
        policy: &DeletePolicy,
        load_date: NaiveDate,
    ) -> Result<u64, DbError> {
        let sql = delete_statement(Dialect::Mssql, table, policy);
        debug!(%sql, "executing delete");
        let result = match policy {
            DeletePolicy::ByDate { .. } => self.client.execute(sql, &[&load_date]).await?,
            DeletePolicy::ReplaceAll => self.client.execute(sql, &[]).await?,
        };
        Ok(result.total())
    }

    async fn insert_rows(&mut self, table: &TableName, rows: &[StockRecord]) -> Result<u64, DbError> {
        let mut written = 0;
        for batch in rows.chunks(Dialect::Mssql.rows_per_statement()) {
            let mut query = Query::new(insert_statement(Dialect::Mssql, table, batch.len()));
            for value in batch.iter().flat_map(StockRecord::values) {
                match value {
                    SqlValue::Text(v) => query.bind(v),
                    SqlValue::Date(v) => query.bind(v),
                    SqlValue::BigInt(v) => query.bind(v),
                }
            }
            let n = query.execute(&mut self.client).await?.total();
            debug!(rows = batch.len(), written = n, "insert statement");
            written += n;
        }
        Ok(written)
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Err(DbError::NoTransaction("commit"));
        }
        self.batch("COMMIT TRANSACTION").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        if !std::mem::take(&mut self.in_transaction) {
            return Ok(());
        }
        self.batch("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }
}

/// SQL Server target. Opening acquires one token and one connection.
pub struct SqlServerDestination {
    address: ServerAddress,
    database: String,
    credential: Box<dyn TokenCredential>,
}

impl SqlServerDestination {
    pub fn new(
        server: &str,
        database: impl Into<String>,
        credential: Box<dyn TokenCredential>,
    ) -> Result<Self, DbError> {
        Ok(Self {
            address: ServerAddress::parse(server)?,
            database: database.into(),
            credential,
        })
    }
}

#[async_trait]
impl Destination for SqlServerDestination {
    async fn open(&self) -> Result<Box<dyn ReferenceStore>, OpenError> {
        let token = self.credential.get_token(DATABASE_SCOPE).await?;
        debug!(
            expires_on = ?token.expires_on(),
            attribute_bytes = token.to_connect_attribute().value.len(),
            "acquired database token"
        );
        let store = connect(&self.address, &self.database, &token).await?;
        Ok(Box::new(store))
    }
}
