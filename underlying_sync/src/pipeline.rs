//! Fetch, normalize, load, strictly in that order.

use std::num::NonZeroUsize;

use tracing::{info, warn};
use underlying_ingestor::{models::UnderlyingInfoParams, providers::DataProvider};

use crate::{
    config::{DEFAULT_CHUNK_SIZE, EtlConfig},
    db::Destination,
    error::EtlError,
    loader::{
        DeletePolicy, LoadPlan, LoadSummary, check_delete_scope, replace_rows, stamp_load_date,
    },
    normalize::normalize,
};

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Stop after normalization; no authentication, no database.
    pub dry_run: bool,
    pub chunk_size: NonZeroUsize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The vendor returned nothing for the date; the table was left alone.
    NoData,
    DryRun { rows: usize },
    Loaded(LoadSummary),
}

pub struct Pipeline<'a> {
    pub config: &'a EtlConfig,
    pub provider: &'a dyn DataProvider,
    pub destination: &'a dyn Destination,
    pub options: RunOptions,
}

impl Pipeline<'_> {
    pub async fn run(&self) -> Result<RunOutcome, EtlError> {
        let config = self.config;
        info!(load_date = %config.load_date, table = %config.table, "fetching underlying info");

        let rows = self
            .provider
            .fetch_underlying_info(&UnderlyingInfoParams::for_date(config.load_date))
            .await?;
        if rows.is_empty() {
            warn!(load_date = %config.load_date, "vendor returned no rows, nothing to load");
            return Ok(RunOutcome::NoData);
        }
        info!(rows = rows.len(), columns = rows.columns().len(), "fetched");

        let normalized = normalize(rows)?;
        let report = &normalized.report;
        if !report.renamed.is_empty() {
            info!(renamed = ?report.renamed, "renamed vendor columns");
        }
        if !report.missing.is_empty() {
            info!(missing = ?report.missing, "columns absent from the feed will be null");
        }
        if !report.dropped.is_empty() {
            info!(dropped = ?report.dropped, "ignoring extra vendor columns");
        }
        if report.nulled_dates > 0 {
            warn!(count = report.nulled_dates, "unparseable dates stored as null");
        }
        if report.synthesized_ids {
            info!("StockID absent, assigned sequential ids");
        }

        let delete_column_missing = match &config.delete_policy {
            DeletePolicy::ByDate { column } => report.missing.iter().any(|c| *c == column.as_str()),
            DeletePolicy::ReplaceAll => false,
        };
        let mut records = normalized.records;
        if stamp_load_date(
            &mut records,
            &config.delete_policy,
            config.load_date,
            delete_column_missing,
        ) {
            info!(load_date = %config.load_date, "delete column absent from the feed, stamped with the load date");
        }
        check_delete_scope(&records, &config.delete_policy, config.load_date)?;
        if self.options.dry_run {
            info!(rows = records.len(), "dry run, skipping database load");
            return Ok(RunOutcome::DryRun {
                rows: records.len(),
            });
        }

        let mut store = self.destination.open().await?;
        let plan = LoadPlan {
            table: config.table.clone(),
            policy: config.delete_policy.clone(),
            load_date: config.load_date,
            chunk_size: self.options.chunk_size,
        };
        let summary = replace_rows(store.as_mut(), &plan, &records).await?;
        Ok(RunOutcome::Loaded(summary))
    }
}
