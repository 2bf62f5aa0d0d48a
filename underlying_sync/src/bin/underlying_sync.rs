use std::{num::NonZeroUsize, path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::ProcessEnv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use underlying_ingestor::providers::ivol_rest::IvolProvider;
use underlying_sync::{
    auth::default_credential,
    config::{DEFAULT_CHUNK_SIZE, EtlConfig, Overrides, Target},
    db::{Destination, mssql::SqlServerDestination, sqlite::SqliteDestination},
    error::EtlError,
    pipeline::{Pipeline, RunOptions, RunOutcome},
};

#[derive(Parser)]
#[command(version, about = "Replace-load IVolatility underlying reference data")]
struct Cli {
    /// Fetch and normalize only; do not authenticate or touch the database.
    #[arg(long)]
    dry_run: bool,

    /// Load into a local SQLite file instead of SQL Server.
    #[arg(long, value_name = "PATH")]
    sqlite: Option<PathBuf>,

    /// Delete every row in the target table instead of only the load date's.
    #[arg(long)]
    replace_all: bool,

    /// Rows per insert chunk.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: NonZeroUsize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(outcome) => {
            match outcome {
                RunOutcome::NoData => info!("no data for the load date, table untouched"),
                RunOutcome::DryRun { rows } => info!(rows, "dry run finished"),
                RunOutcome::Loaded(summary) => info!(
                    deleted = summary.deleted,
                    inserted = summary.inserted,
                    chunks = summary.chunks,
                    "load finished"
                ),
            }
            info!("ETL job completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let e = anyhow::Error::from(e);
            error!(error = %format_args!("{e:#}"), "ETL job failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("failed to install tracing subscriber")
}

async fn run(cli: Cli) -> Result<RunOutcome, EtlError> {
    let config = EtlConfig::from_env(Overrides {
        sqlite_path: cli.sqlite,
        replace_all: cli.replace_all,
    })?;
    info!(load_date = %config.load_date, table = %config.table, "configuration resolved");

    let api_key = SecretString::from(config.api_key.expose_secret().to_owned());
    let provider = match &config.vendor_base_url {
        Some(url) => IvolProvider::with_base_url(api_key, url)?,
        None => IvolProvider::new(api_key)?,
    };

    let destination: Box<dyn Destination> = match &config.target {
        Target::SqlServer { server, database } => Box::new(SqlServerDestination::new(
            server,
            database.as_str(),
            Box::new(default_credential(&ProcessEnv)?),
        )?),
        Target::Sqlite { path } => Box::new(SqliteDestination::new(path, config.table.clone())),
    };

    Pipeline {
        config: &config,
        provider: &provider,
        destination: destination.as_ref(),
        options: RunOptions {
            dry_run: cli.dry_run,
            chunk_size: cli.chunk_size,
        },
    }
    .run()
    .await
}
