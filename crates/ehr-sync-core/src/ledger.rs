//! Append-only sync ledger.
//!
//! Both the device store and the central store keep a ledger of every sync
//! attempt. There is deliberately no update or delete operation.

use crate::models::{LedgerStatus, SyncLedgerEntry};

/// Read and append contract shared by the device and server ledgers.
pub trait SyncLedger {
    type Error;

    /// Append an entry.
    fn record(&self, entry: &SyncLedgerEntry) -> Result<(), Self::Error>;

    /// The `n` most recent entries, newest first.
    fn tail(&self, n: usize) -> Result<Vec<SyncLedgerEntry>, Self::Error>;

    /// Summary of one worker's attempts.
    fn status_for(&self, worker_id: &str) -> Result<LedgerStatus, Self::Error>;
}
