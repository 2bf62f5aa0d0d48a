//! Run configuration resolved from the environment.
//!
//! Everything is validated here, before the pipeline touches the network.

use std::{num::NonZeroUsize, path::PathBuf};

use chrono::{Days, NaiveDate, Utc};
use secrecy::SecretString;
use shared_utils::{
    config::ConfigError,
    env::{EnvSource, ProcessEnv},
};
use tracing::warn;

use crate::{db::statements::TableName, loader::DeletePolicy, models::DATE_COLUMNS};

pub const DEFAULT_TARGET_TABLE: &str = "dbo.UnderlyingInfo";
pub const DEFAULT_DELETE_COLUMN: &str = "Start_date";
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::new(5000).unwrap();

/// Where rows are loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    SqlServer { server: String, database: String },
    /// Local SQLite file; no token is needed.
    Sqlite { path: PathBuf },
}

/// Command-line choices that take part in resolution.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub sqlite_path: Option<PathBuf>,
    pub replace_all: bool,
}

#[derive(Debug)]
pub struct EtlConfig {
    pub api_key: SecretString,
    pub load_date: NaiveDate,
    pub target: Target,
    pub table: TableName,
    pub delete_policy: DeletePolicy,
    pub vendor_base_url: Option<String>,
    /// `TARGET_TABLE` was unset and the default was used.
    pub table_defaulted: bool,
}

impl EtlConfig {
    /// Resolves the configuration from the process environment with today's
    /// UTC date as the reference for the default load date.
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        Self::resolve(&ProcessEnv, Utc::now().date_naive(), overrides)
    }

    /// Resolves the configuration from `env`.
    ///
    /// Checks run in a fixed order (API key, load date, server and database,
    /// table, delete policy) so the first problem reported is stable.
    pub fn resolve(
        env: &impl EnvSource,
        today: NaiveDate,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let api_key = SecretString::from(env.require("IVOL_API_KEY")?);

        let load_date = match env.optional("LOAD_DATE") {
            Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|e| ConfigError::invalid("LOAD_DATE", &raw, format!("expected YYYY-MM-DD: {e}")))?,
            None => today
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| ConfigError::invalid("LOAD_DATE", "", "no previous day"))?,
        };

        let target = match overrides.sqlite_path {
            Some(path) => Target::Sqlite { path },
            None => Target::SqlServer {
                server: env.require("DB_SERVER")?,
                database: env.require("DB_NAME")?,
            },
        };

        let (raw_table, table_defaulted) = match env.optional("TARGET_TABLE") {
            Some(t) => (t, false),
            None => (DEFAULT_TARGET_TABLE.to_string(), true),
        };
        let table = TableName::parse(&raw_table)
            .map_err(|reason| ConfigError::invalid("TARGET_TABLE", &raw_table, reason))?;
        if table_defaulted {
            warn!("TARGET_TABLE not set, defaulting to {DEFAULT_TARGET_TABLE}");
        }

        let delete_policy = resolve_delete_policy(env, overrides.replace_all)?;

        Ok(Self {
            api_key,
            load_date,
            target,
            table,
            delete_policy,
            vendor_base_url: env.optional("IVOL_BASE_URL"),
            table_defaulted,
        })
    }
}

fn resolve_delete_policy(env: &impl EnvSource, replace_all: bool) -> Result<DeletePolicy, ConfigError> {
    let replace_all = replace_all
        || match env.optional("DELETE_MODE").map(|m| m.to_ascii_lowercase()) {
            None => false,
            Some(m) if m == "by-date" => false,
            Some(m) if m == "all" => true,
            Some(m) => {
                return Err(ConfigError::invalid(
                    "DELETE_MODE",
                    &m,
                    "expected `by-date` or `all`",
                ));
            }
        };
    if replace_all {
        return Ok(DeletePolicy::ReplaceAll);
    }

    let column = env
        .optional("DELETE_COLUMN")
        .unwrap_or_else(|| DEFAULT_DELETE_COLUMN.to_string());
    match DATE_COLUMNS.iter().find(|c| c.eq_ignore_ascii_case(&column)) {
        Some(c) => Ok(DeletePolicy::ByDate { column: c.to_string() }),
        None => Err(ConfigError::invalid(
            "DELETE_COLUMN",
            &column,
            format!("expected one of the date columns {}", DATE_COLUMNS.join(", ")),
        )),
    }
}
