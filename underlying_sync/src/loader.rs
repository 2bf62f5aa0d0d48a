//! Transactional replace-load.
//!
//! One transaction covers the delete and every insert chunk, so the table is
//! either entirely as before or entirely reloaded.

use std::num::NonZeroUsize;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    db::{DbError, ReferenceStore, statements::TableName},
    models::StockRecord,
};

/// Which existing rows a load replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Rows whose `column` equals the load date.
    ByDate { column: String },
    /// Every row in the table.
    ReplaceAll,
}

#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub table: TableName,
    pub policy: DeletePolicy,
    pub load_date: NaiveDate,
    pub chunk_size: NonZeroUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub deleted: u64,
    pub inserted: u64,
    pub chunks: usize,
}

/// A by-date load whose rows the by-date delete would not remove.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{mismatched} of {total} rows have {column} other than the load date {load_date}; \
     deleting by {column} would not replace them. Use --replace-all or DELETE_MODE=all"
)]
pub struct DeleteScopeError {
    pub column: String,
    pub load_date: NaiveDate,
    pub mismatched: usize,
    pub total: usize,
}

/// Fills the delete column with `load_date` on every record when the feed
/// did not carry it. Returns whether anything was stamped.
pub fn stamp_load_date(
    records: &mut [StockRecord],
    policy: &DeletePolicy,
    load_date: NaiveDate,
    column_missing: bool,
) -> bool {
    let DeletePolicy::ByDate { column } = policy else {
        return false;
    };
    if !column_missing {
        return false;
    }
    for record in records.iter_mut() {
        if let Some(slot) = record.date_mut(column) {
            *slot = Some(load_date);
        }
    }
    true
}

/// Under `ByDate`, every record must carry the load date in the delete
/// column, otherwise a rerun would find the old rows still in place.
pub fn check_delete_scope(
    records: &[StockRecord],
    policy: &DeletePolicy,
    load_date: NaiveDate,
) -> Result<(), DeleteScopeError> {
    let DeletePolicy::ByDate { column } = policy else {
        return Ok(());
    };
    let mismatched = records
        .iter()
        .filter(|r| r.date(column) != Some(load_date))
        .count();
    if mismatched == 0 {
        Ok(())
    } else {
        Err(DeleteScopeError {
            column: column.clone(),
            load_date,
            mismatched,
            total: records.len(),
        })
    }
}

pub fn chunk_count(rows: usize, chunk_size: NonZeroUsize) -> usize {
    rows.div_ceil(chunk_size.get())
}

/// Deletes per `plan.policy` and inserts `rows` in chunks, all in one
/// transaction. On failure the transaction is rolled back and the original
/// error returned.
pub async fn replace_rows(
    store: &mut dyn ReferenceStore,
    plan: &LoadPlan,
    rows: &[StockRecord],
) -> Result<LoadSummary, DbError> {
    store.begin().await?;
    match load_in_transaction(store, plan, rows).await {
        Ok(summary) => {
            store.commit().await?;
            info!(
                deleted = summary.deleted,
                inserted = summary.inserted,
                chunks = summary.chunks,
                "load committed"
            );
            Ok(summary)
        }
        Err(e) => {
            if let Err(rollback) = store.rollback().await {
                warn!(error = %rollback, "rollback failed");
            } else {
                warn!("load rolled back");
            }
            Err(e)
        }
    }
}

async fn load_in_transaction(
    store: &mut dyn ReferenceStore,
    plan: &LoadPlan,
    rows: &[StockRecord],
) -> Result<LoadSummary, DbError> {
    if plan.policy == DeletePolicy::ReplaceAll {
        warn!(table = %plan.table, "deleting every row before reload");
    }
    let deleted = store
        .delete_rows(&plan.table, &plan.policy, plan.load_date)
        .await?;
    info!(table = %plan.table, deleted, "deleted existing rows");

    let total_chunks = chunk_count(rows.len(), plan.chunk_size);
    let mut summary = LoadSummary {
        deleted,
        ..LoadSummary::default()
    };
    for (i, chunk) in rows.chunks(plan.chunk_size.get()).enumerate() {
        summary.inserted += store.insert_rows(&plan.table, chunk).await?;
        summary.chunks += 1;
        info!(
            chunk = i + 1,
            of = total_chunks,
            rows = chunk.len(),
            total = summary.inserted,
            "inserted chunk"
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum Call {
        Begin,
        Delete(DeletePolicy),
        Insert(usize),
        Commit,
        Rollback,
    }

    #[derive(Default)]
    struct FakeStore {
        calls: Vec<Call>,
        fail_on_insert: Option<usize>,
        inserts: usize,
    }

    #[async_trait]
    impl ReferenceStore for FakeStore {
        async fn begin(&mut self) -> Result<(), DbError> {
            self.calls.push(Call::Begin);
            Ok(())
        }

        async fn delete_rows(
            &mut self,
            _table: &TableName,
            policy: &DeletePolicy,
            _load_date: NaiveDate,
        ) -> Result<u64, DbError> {
            self.calls.push(Call::Delete(policy.clone()));
            Ok(7)
        }

        async fn insert_rows(&mut self, _table: &TableName, rows: &[StockRecord]) -> Result<u64, DbError> {
            self.inserts += 1;
            if self.fail_on_insert == Some(self.inserts) {
                return Err(DbError::NoTransaction("insert"));
            }
            self.calls.push(Call::Insert(rows.len()));
            Ok(rows.len() as u64)
        }

        async fn commit(&mut self) -> Result<(), DbError> {
            self.calls.push(Call::Commit);
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), DbError> {
            self.calls.push(Call::Rollback);
            Ok(())
        }
    }

    fn plan(chunk: usize) -> LoadPlan {
        LoadPlan {
            table: TableName::parse("dbo.UnderlyingInfo").unwrap(),
            policy: DeletePolicy::ByDate {
                column: "Start_date".into(),
            },
            load_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            chunk_size: NonZeroUsize::new(chunk).unwrap(),
        }
    }

    fn rows(n: usize) -> Vec<StockRecord> {
        (1..=n as i64)
            .map(|id| StockRecord {
                stock_id: id,
                ..StockRecord::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn delete_then_chunks_then_commit() {
        let mut store = FakeStore::default();
        let summary = replace_rows(&mut store, &plan(2), &rows(5)).await.unwrap();

        assert_eq!(
            summary,
            LoadSummary {
                deleted: 7,
                inserted: 5,
                chunks: 3
            }
        );
        assert_eq!(
            store.calls,
            [
                Call::Begin,
                Call::Delete(plan(2).policy),
                Call::Insert(2),
                Call::Insert(2),
                Call::Insert(1),
                Call::Commit,
            ]
        );
    }

    #[tokio::test]
    async fn failing_chunk_rolls_back() {
        let mut store = FakeStore {
            fail_on_insert: Some(2),
            ..FakeStore::default()
        };
        let err = replace_rows(&mut store, &plan(2), &rows(5)).await.unwrap_err();

        assert!(matches!(err, DbError::NoTransaction("insert")));
        assert_eq!(
            store.calls,
            [
                Call::Begin,
                Call::Delete(plan(2).policy),
                Call::Insert(2),
                Call::Rollback,
            ]
        );
    }

    fn by_date() -> DeletePolicy {
        plan(1).policy
    }

    #[test]
    fn scope_check_counts_rows_outside_the_load_date() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let listing = NaiveDate::from_ymd_opt(1980, 12, 12).unwrap();
        let mut records = rows(3);
        records[0].start_date = Some(day);
        records[1].start_date = Some(listing);

        let err = check_delete_scope(&records, &by_date(), day).unwrap_err();
        assert_eq!((err.mismatched, err.total), (2, 3));
        let message = err.to_string();
        assert!(message.starts_with("2 of 3 rows have Start_date other than the load date 2024-01-05"));
        assert!(message.contains("--replace-all"));

        assert!(check_delete_scope(&records, &DeletePolicy::ReplaceAll, day).is_ok());
        assert!(check_delete_scope(&records[..1], &by_date(), day).is_ok());
    }

    #[test]
    fn stamping_only_when_column_was_absent() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let mut records = rows(2);

        assert!(!stamp_load_date(&mut records, &by_date(), day, false));
        assert!(!stamp_load_date(&mut records, &DeletePolicy::ReplaceAll, day, true));
        assert!(records.iter().all(|r| r.start_date.is_none()));

        assert!(stamp_load_date(&mut records, &by_date(), day, true));
        assert!(records.iter().all(|r| r.start_date == Some(day)));
        assert!(check_delete_scope(&records, &by_date(), day).is_ok());
    }

    #[tokio::test]
    async fn no_rows_still_deletes_and_commits() {
        let mut store = FakeStore::default();
        let summary = replace_rows(&mut store, &plan(10), &[]).await.unwrap();
        assert_eq!(summary.chunks, 0);
        assert_eq!(store.calls.last(), Some(&Call::Commit));
    }

    proptest! {
        #[test]
        fn chunks_cover_every_row(m in 0usize..2_000, chunk in 1usize..600) {
            let rows = rows(m);
            let plan = plan(chunk);
            let mut store = FakeStore::default();
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let summary = runtime.block_on(replace_rows(&mut store, &plan, &rows)).unwrap();

            prop_assert_eq!(summary.chunks, m.div_ceil(chunk));
            prop_assert_eq!(summary.chunks, chunk_count(m, plan.chunk_size));
            prop_assert_eq!(summary.inserted, m as u64);
            let sizes: Vec<usize> = store
                .calls
                .iter()
                .filter_map(|c| match c { Call::Insert(n) => Some(*n), _ => None })
                .collect();
            prop_assert!(sizes.iter().all(|&n| n <= chunk && n > 0));
        }
    }
}
