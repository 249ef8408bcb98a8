//! Central aggregator: applies uploaded batches to the central store.

use clap::ValueEnum;
use ehr_sync_core::db::append_entry;
use ehr_sync_core::models::{Batch, SyncLedgerEntry, UploadAck};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AggregatorError;
use crate::store::{apply_batch, validate_batch, CentralStore};

/// Who owns a patient that more than one worker has uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OwnershipPolicy {
    /// The most recent uploader takes ownership
    LastWriterWins,
    /// The first uploader keeps ownership
    FirstWriterWins,
}

pub const DEFAULT_OWNERSHIP_POLICY: OwnershipPolicy = OwnershipPolicy::LastWriterWins;

pub const DEFAULT_MAX_BATCH_ROWS: usize = 5_000;

impl Default for OwnershipPolicy {
    fn default() -> Self {
        DEFAULT_OWNERSHIP_POLICY
    }
}

#[derive(Clone)]
pub struct Aggregator {
    store: CentralStore,
    policy: OwnershipPolicy,
    max_batch_rows: usize,
}

impl Aggregator {
    pub fn new(store: CentralStore) -> Self {
        Self {
            store,
            policy: DEFAULT_OWNERSHIP_POLICY,
            max_batch_rows: DEFAULT_MAX_BATCH_ROWS,
        }
    }

    pub fn with_policy(mut self, policy: OwnershipPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_batch_rows(mut self, max_batch_rows: usize) -> Self {
        self.max_batch_rows = max_batch_rows;
        self
    }

    pub fn store(&self) -> &CentralStore {
        &self.store
    }

    pub fn policy(&self) -> OwnershipPolicy {
        self.policy
    }

    /// Apply one device batch for `worker_id`.
    ///
    /// The whole batch commits together with its success ledger entry, or
    /// nothing is written and a failed entry is logged instead.
    #[tracing::instrument(skip(self, batch), fields(worker = %worker_id, rows = batch.len()))]
    pub async fn upload(&self, worker_id: &str, batch: Batch) -> Result<UploadAck, AggregatorError> {
        let worker = worker_id.to_string();
        let policy = self.policy;
        let limit = self.max_batch_rows;

        self.store
            .call(move |conn| {
                let result = if batch.len() > limit {
                    Err(AggregatorError::BatchTooLarge {
                        rows: batch.len(),
                        limit,
                    })
                } else {
                    commit_batch(conn, &worker, &batch, policy)
                };

                match result {
                    Ok(ack) => {
                        info!(committed = ack.committed, sync_id = %ack.sync_id, "batch committed");
                        Ok(ack)
                    }
                    Err(err) => {
                        warn!(error = %err, "batch refused");
                        record_failure(conn, &worker);
                        Err(err)
                    }
                }
            })
            .await
    }

    /// Log a failed ledger entry for an upload that never decoded into a
    /// batch and hand the error back for the response.
    #[tracing::instrument(skip(self, err), fields(worker = %worker_id))]
    pub async fn refuse(&self, worker_id: &str, err: AggregatorError) -> AggregatorError {
        warn!(error = %err, "upload body refused");
        let worker = worker_id.to_string();
        let logged = self
            .store
            .call(move |conn| {
                record_failure(conn, &worker);
                Ok::<_, AggregatorError>(())
            })
            .await;
        match logged {
            Ok(()) => err,
            Err(store_err) => store_err,
        }
    }
}

fn commit_batch(
    conn: &mut Connection,
    worker: &str,
    batch: &Batch,
    policy: OwnershipPolicy,
) -> Result<UploadAck, AggregatorError> {
    let tx = conn.transaction()?;
    validate_batch(&tx, batch)?;

    let written = apply_batch(&tx, batch, worker, policy)?;
    let committed = u32::try_from(written).unwrap_or(u32::MAX);

    let entry = SyncLedgerEntry::succeeded(worker, committed);
    append_entry(&tx, &entry)?;
    tx.commit()?;

    Ok(UploadAck {
        committed,
        sync_id: entry.id,
    })
}

fn record_failure(conn: &Connection, worker: &str) {
    if let Err(e) = append_entry(conn, &SyncLedgerEntry::failed(worker, 0)) {
        warn!(error = %e, "could not record failed batch in ledger");
    }
}
