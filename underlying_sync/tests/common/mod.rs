#![allow(dead_code)]

use std::path::PathBuf;

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Nullable, Text};
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};
use underlying_sync::db::sqlite::connect_sqlite;
use underlying_sync::models::StockRecord;

pub struct TestDb {
    _dir: TempDir,     // keep alive for the life of the test
    pub path: PathBuf, // <tmpdir>/test.db
}

pub fn temp_db() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("test.db");
    TestDb { _dir: dir, path }
}

impl TestDb {
    pub fn connect(&self) -> SqliteConnection {
        connect_sqlite(&self.path.to_string_lossy()).expect("connect")
    }
}

#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = BigInt)]
    n: i64,
}

#[derive(Debug, PartialEq, QueryableByName)]
pub struct StoredRow {
    #[diesel(sql_type = BigInt, column_name = "StockID")]
    pub stock_id: i64,
    #[diesel(sql_type = Nullable<Text>, column_name = "Stock_ticker")]
    pub ticker: Option<String>,
    #[diesel(sql_type = Nullable<Text>, column_name = "Start_date")]
    pub start_date: Option<String>,
}

pub fn count_rows(conn: &mut SqliteConnection, table: &str) -> i64 {
    let c: Count = sql_query(format!("SELECT COUNT(*) AS n FROM \"{table}\""))
        .get_result(conn)
        .expect("count");
    c.n
}

pub fn count_nulls(conn: &mut SqliteConnection, table: &str, column: &str) -> i64 {
    let c: Count = sql_query(format!(
        "SELECT COUNT(*) AS n FROM \"{table}\" WHERE \"{column}\" IS NULL"
    ))
    .get_result(conn)
    .expect("count nulls");
    c.n
}

pub fn stored_rows(conn: &mut SqliteConnection, table: &str) -> Vec<StoredRow> {
    sql_query(format!(
        "SELECT \"StockID\", \"Stock_ticker\", \"Start_date\" FROM \"{table}\" ORDER BY \"StockID\""
    ))
    .load(conn)
    .expect("load rows")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn record(stock_id: i64, ticker: &str, start_date: NaiveDate) -> StockRecord {
    StockRecord {
        stock_id,
        stock_ticker: Some(ticker.to_string()),
        start_date: Some(start_date),
        ..StockRecord::default()
    }
}

/// A one-shot HTTP server: answers the first request with a canned
/// response and hands back the raw request (head and body).
pub struct StubServer {
    pub base_url: String,
    handle: JoinHandle<String>,
}

impl StubServer {
    pub async fn respond(status: u16, content_type: &str, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("local addr");
        let response = format!(
            "HTTP/1.1 {status} Stub\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + body_len {
                        break;
                    }
                }
                let n = socket.read(&mut chunk).await.expect("read request");
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).into_owned()
        });

        Self {
            base_url: format!("http://{addr}"),
            handle,
        }
    }

    pub async fn json(status: u16, body: &str) -> Self {
        Self::respond(status, "application/json", body).await
    }

    /// The request the server received.
    pub async fn request(self) -> String {
        self.handle.await.expect("stub task")
    }
}
