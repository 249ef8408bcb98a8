//! Sync client: uploads pending rows and marks them synced once acknowledged.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use super::{ChangeTracker, Connectivity, SyncConfig, SyncError, SyncErrorKind, SyncTransport};
use crate::db::{BatchScope, Database, DbResult, MarkedCounts};
use crate::ledger::SyncLedger;
use crate::models::{Batch, SyncLedgerEntry, UploadAck};

/// Identity and bearer token of the worker operating the device.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub worker_id: String,
    pub token: String,
}

impl Credentials {
    pub fn new(worker_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            token: token.into(),
        }
    }
}

/// Result of a successful sync call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Rows the server reported as committed
    pub committed: u32,
    /// Server ledger id, absent when nothing was sent
    pub sync_id: Option<String>,
    /// Upload attempts made
    pub attempts: u32,
    /// Visits flipped to synced locally
    pub visits_marked: usize,
    /// Vaccinations flipped to synced locally
    pub vaccinations_marked: usize,
}

impl SyncReport {
    fn acknowledged(ack: UploadAck, attempts: u32, marked: MarkedCounts) -> Self {
        Self {
            committed: ack.committed,
            sync_id: Some(ack.sync_id),
            attempts,
            visits_marked: marked.visits,
            vaccinations_marked: marked.vaccinations,
        }
    }
}

/// Drives one device's sync against the central aggregator.
///
/// Local sync flags are only ever changed after the server has acknowledged
/// the batch. Anything that fails before that point leaves every row pending.
pub struct SyncClient<T, C> {
    db: Arc<Mutex<Database>>,
    transport: T,
    connectivity: C,
    config: SyncConfig,
    in_flight: tokio::sync::Mutex<()>,
}

impl<T: SyncTransport, C: Connectivity> SyncClient<T, C> {
    pub fn new(db: Arc<Mutex<Database>>, transport: T, connectivity: C, config: SyncConfig) -> Self {
        Self {
            db,
            transport,
            connectivity,
            config,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Upload pending rows.
    #[tracing::instrument(skip(self, credentials), fields(worker = %credentials.worker_id))]
    pub async fn sync(&self, credentials: &Credentials) -> Result<SyncReport, SyncError> {
        self.run(credentials, BatchScope::Pending).await
    }

    /// Re-upload every row regardless of sync state.
    ///
    /// Existing flags are left alone until the server confirms the resend;
    /// upsert idempotence on the server makes the duplicate rows harmless.
    #[tracing::instrument(skip(self, credentials), fields(worker = %credentials.worker_id))]
    pub async fn force_sync_all(&self, credentials: &Credentials) -> Result<SyncReport, SyncError> {
        self.run(credentials, BatchScope::All).await
    }

    async fn run(&self, credentials: &Credentials, scope: BatchScope) -> Result<SyncReport, SyncError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SyncError::new(SyncErrorKind::InProgress, "a sync is already running"))?;

        if !self.connectivity.is_online() {
            return Err(SyncError::offline());
        }

        let batch = self.with_db(|db| ChangeTracker::new(db).collect(scope))?;
        if batch.is_empty() {
            info!("nothing to sync");
            return Ok(SyncReport::default());
        }

        if credentials.token.is_empty() {
            return Err(SyncError::new(SyncErrorKind::Unauthorized, "no credential"));
        }

        let submitted = batch.len();
        info!(rows = submitted, "uploading batch");

        let (result, attempts) = self.upload_with_retry(&batch, &credentials.token).await;

        let ack = match result {
            Ok(ack) => ack,
            Err(err) => {
                warn!(attempts, error = %err, "sync failed, rows stay pending");
                self.record_failure(&credentials.worker_id, 0);
                return Err(err);
            }
        };

        if (ack.committed as usize) < submitted {
            warn!(
                committed = ack.committed,
                submitted, "server committed fewer rows than sent"
            );
            self.record_failure(&credentials.worker_id, ack.committed);
            return Err(SyncError::new(
                SyncErrorKind::PartialCommit,
                format!("server committed {} of {} rows", ack.committed, submitted),
            ));
        }

        let entry = SyncLedgerEntry::succeeded(&credentials.worker_id, ack.committed);
        let receipt = batch.receipt();
        let marked = match self.with_db(|db| db.acknowledge(&receipt, &entry)) {
            Ok(marked) => marked,
            Err(err) => {
                warn!(error = %err, "server committed but local marks failed, rows stay pending");
                self.record_failure(&credentials.worker_id, ack.committed);
                return Err(err);
            }
        };

        info!(
            committed = ack.committed,
            sync_id = %ack.sync_id,
            visits = marked.visits,
            vaccinations = marked.vaccinations,
            "sync acknowledged"
        );

        Ok(SyncReport::acknowledged(ack, attempts, marked))
    }

    /// Upload with exponential backoff for retryable failures. Returns the
    /// final result and the number of attempts made.
    async fn upload_with_retry(&self, batch: &Batch, token: &str) -> (Result<UploadAck, SyncError>, u32) {
        let max_attempts = self.config.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.transport.upload(batch, token).await {
                Ok(ack) => {
                    if attempt > 1 {
                        info!(attempt, "upload succeeded after retry");
                    }
                    return (Ok(ack), attempt);
                }
                Err(e) => SyncError::from(e),
            };

            if !err.kind.is_retryable() || attempt >= max_attempts {
                return (Err(err), attempt);
            }

            let delay = self.config.backoff_delay(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient sync failure, retrying"
            );
            tokio::time::sleep(delay).await;

            if !self.connectivity.is_online() {
                return (Err(SyncError::offline()), attempt);
            }
        }
    }

    fn record_failure(&self, worker_id: &str, committed: u32) {
        let entry = SyncLedgerEntry::failed(worker_id, committed);
        if let Err(e) = self.with_db(|db| db.record(&entry)) {
            warn!(error = %e, "could not record failed sync in ledger");
        }
    }

    fn with_db<R>(&self, f: impl FnOnce(&Database) -> DbResult<R>) -> Result<R, SyncError> {
        let db = self
            .db
            .lock()
            .map_err(|e| SyncError::new(SyncErrorKind::Storage, format!("Lock poisoned: {}", e)))?;
        f(&db).map_err(SyncError::from)
    }
}
