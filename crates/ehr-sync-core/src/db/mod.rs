//! Local record store for ehr-sync.

mod schema;
mod patients;
mod visits;
mod vaccinations;
mod ledger;
mod stats;

pub use schema::*;
#[allow(unused_imports)]
pub use patients::*;
#[allow(unused_imports)]
pub use visits::*;
#[allow(unused_imports)]
pub use vaccinations::*;
pub use ledger::{append_entry, tail_entries, worker_status, worker_tail, SYNC_LOG_SCHEMA};
pub use stats::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::models::{Batch, BatchReceipt, SyncLedgerEntry};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Which rows a batch read should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchScope {
    /// All patients plus unsynced visits and vaccinations
    Pending,
    /// Every row
    All,
}

/// Rows flipped by [`Database::mark_synced`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkedCounts {
    pub patients: usize,
    pub visits: usize,
    pub vaccinations: usize,
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        self.conn.execute_batch(SYNC_LOG_SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Read a batch as one consistent snapshot.
    pub fn read_batch(&self, scope: BatchScope) -> DbResult<Batch> {
        let include_synced = scope == BatchScope::All;
        let tx = self.conn.unchecked_transaction()?;

        let batch = Batch {
            patients: patients::query_patients(&tx)?,
            visits: visits::query_visits(&tx, include_synced)?,
            vaccinations: vaccinations::query_vaccinations(&tx, include_synced)?,
        };

        tx.commit()?;
        Ok(batch)
    }

    /// Mark the rows of an acknowledged batch as synced, all or nothing.
    ///
    /// Visits and vaccinations are only flipped when their stored revision
    /// still matches the revision that was uploaded.
    pub fn mark_synced(&self, receipt: &BatchReceipt) -> DbResult<MarkedCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let counts = mark_in(&tx, receipt)?;
        tx.commit()?;
        Ok(counts)
    }

    /// Mark an acknowledged batch and append its ledger entry in one transaction.
    pub fn acknowledge(
        &self,
        receipt: &BatchReceipt,
        entry: &SyncLedgerEntry,
    ) -> DbResult<MarkedCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let counts = mark_in(&tx, receipt)?;
        append_entry(&tx, entry)?;
        tx.commit()?;
        Ok(counts)
    }
}

fn mark_in(conn: &Connection, receipt: &BatchReceipt) -> DbResult<MarkedCounts> {
    let now = chrono::Utc::now().to_rfc3339();
    Ok(MarkedCounts {
        patients: patients::stamp_synced(conn, &receipt.patient_ids, &now)?,
        visits: visits::flag_synced(conn, &receipt.visits)?,
        vaccinations: vaccinations::flag_synced(conn, &receipt.vaccinations)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, PatientCategory, VaccinationRecord, Visit};

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"patients".to_string()));
        assert!(tables.contains(&"visits".to_string()));
        assert!(tables.contains(&"vaccinations".to_string()));
        assert!(tables.contains(&"sync_log".to_string()));
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.db");

        {
            let db = Database::open(&path).unwrap();
            let patient = Patient::with_id("p1", "Asha Devi", "1995-03-15", "Female", PatientCategory::Pregnant);
            db.save_patient(&patient).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.get_patient("p1").unwrap().is_some());
    }

    #[test]
    fn test_read_batch_scopes() {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::with_id("p1", "Asha Devi", "1995-03-15", "Female", PatientCategory::Pregnant);
        db.save_patient(&patient).unwrap();

        let synced = Visit::new("p1");
        let pending = Visit::new("p1");
        db.save_visit(&synced).unwrap();
        db.save_visit(&pending).unwrap();
        db.save_vaccination(&VaccinationRecord::due("p1", "TT-1", "2024-02-01"))
            .unwrap();

        let batch = db.read_batch(BatchScope::Pending).unwrap();
        db.mark_synced(&Batch {
            patients: vec![],
            visits: batch.visits.iter().filter(|v| v.id == synced.id).cloned().collect(),
            vaccinations: vec![],
        }
        .receipt())
            .unwrap();

        let pending_batch = db.read_batch(BatchScope::Pending).unwrap();
        assert_eq!(pending_batch.patients.len(), 1);
        assert_eq!(pending_batch.visits.len(), 1);
        assert_eq!(pending_batch.visits[0].id, pending.id);
        assert_eq!(pending_batch.vaccinations.len(), 1);

        let all = db.read_batch(BatchScope::All).unwrap();
        assert_eq!(all.visits.len(), 2);
    }

    #[test]
    fn test_mark_synced_skips_rows_edited_in_flight() {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::with_id("p1", "Asha Devi", "1995-03-15", "Female", PatientCategory::Pregnant);
        db.save_patient(&patient).unwrap();

        let mut visit = Visit::new("p1");
        db.save_visit(&visit).unwrap();

        let sent = db.read_batch(BatchScope::Pending).unwrap();

        // Edited after the batch was read but before the ack arrived
        visit.notes = Some("follow-up needed".into());
        db.save_visit(&visit).unwrap();

        let counts = db.mark_synced(&sent.receipt()).unwrap();
        assert_eq!(counts.patients, 1);
        assert_eq!(counts.visits, 0);

        let stored = db.get_visit(&visit.id).unwrap().unwrap();
        assert!(!stored.synced);
        assert_eq!(stored.notes.as_deref(), Some("follow-up needed"));
    }
}
