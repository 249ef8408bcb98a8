//! Central record store.

mod ingest;
mod queries;
mod schema;

pub use ingest::*;
pub use queries::*;
pub use schema::CENTRAL_SCHEMA;

use std::path::Path;
use std::sync::{Arc, Mutex};

use ehr_sync_core::db::{append_entry, tail_entries, worker_status, SYNC_LOG_SCHEMA};
use ehr_sync_core::ledger::SyncLedger;
use ehr_sync_core::models::{LedgerStatus, SyncLedgerEntry};
use rusqlite::Connection;

use crate::error::{StoreError, StoreResult};

/// Shared handle to the central SQLite database.
///
/// All devices' uploads serialize on the one connection; handlers reach it
/// through [`CentralStore::call`] so blocking SQLite work stays off the
/// async executor.
#[derive(Clone)]
pub struct CentralStore {
    conn: Arc<Mutex<Connection>>,
}

impl CentralStore {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::initialize(Connection::open(path)?)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(CENTRAL_SCHEMA)?;
        conn.execute_batch(SYNC_LOG_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection on the current thread.
    pub fn with_conn<R, E>(&self, f: impl FnOnce(&mut Connection) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }

    /// Run `f` on the blocking pool.
    pub async fn call<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Connection) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.with_conn(f))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

impl SyncLedger for CentralStore {
    type Error = StoreError;

    fn record(&self, entry: &SyncLedgerEntry) -> StoreResult<()> {
        self.with_conn(|conn| Ok(append_entry(conn, entry)?))
    }

    fn tail(&self, n: usize) -> StoreResult<Vec<SyncLedgerEntry>> {
        self.with_conn(|conn| Ok(tail_entries(conn, n)?))
    }

    fn status_for(&self, worker_id: &str) -> StoreResult<LedgerStatus> {
        self.with_conn(|conn| Ok(worker_status(conn, worker_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehr_sync_core::models::LedgerOutcome;

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("central.db");

        {
            let store = CentralStore::open(&path).unwrap();
            store.record(&SyncLedgerEntry::succeeded("asha-1", 3)).unwrap();
        }

        let store = CentralStore::open(&path).unwrap();
        let tail = store.tail(10).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].committed, 3);
    }

    #[test]
    fn test_ledger_status() {
        let store = CentralStore::open_in_memory().unwrap();
        store.record(&SyncLedgerEntry::succeeded("asha-1", 3)).unwrap();
        store.record(&SyncLedgerEntry::failed("asha-1", 0)).unwrap();
        store.record(&SyncLedgerEntry::succeeded("asha-2", 7)).unwrap();

        let status = store.status_for("asha-1").unwrap();
        assert_eq!(status.attempts, 2);
        assert_eq!(status.total_committed, 3);
        assert_eq!(status.last_outcome, Some(LedgerOutcome::Failed));
    }

    #[tokio::test]
    async fn test_call_runs_on_blocking_pool() {
        let store = CentralStore::open_in_memory().unwrap();
        let count: i64 = store
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
