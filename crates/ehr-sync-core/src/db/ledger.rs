//! Sync log operations.
//!
//! The statement helpers take a bare [`Connection`] so the central store,
//! which uses the same `sync_log` layout, can share them.

use rusqlite::{params, Connection, Row};

use super::{Database, DbError, DbResult};
use crate::ledger::SyncLedger;
use crate::models::{LedgerOutcome, LedgerStatus, SyncLedgerEntry};

/// DDL for the append-only `sync_log` table.
pub const SYNC_LOG_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sync_log (
    sync_id TEXT PRIMARY KEY,
    worker_id TEXT NOT NULL,
    date TEXT NOT NULL,
    items_synced_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL CHECK (status IN ('success', 'failed'))
);

CREATE INDEX IF NOT EXISTS idx_sync_log_worker ON sync_log(worker_id, date);

CREATE TRIGGER IF NOT EXISTS sync_log_no_update BEFORE UPDATE ON sync_log
BEGIN
    SELECT RAISE(ABORT, 'sync_log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS sync_log_no_delete BEFORE DELETE ON sync_log
BEGIN
    SELECT RAISE(ABORT, 'sync_log is append-only');
END;
"#;

/// Append one entry to `sync_log`.
pub fn append_entry(conn: &Connection, entry: &SyncLedgerEntry) -> DbResult<()> {
    conn.execute(
        "INSERT INTO sync_log (sync_id, worker_id, date, items_synced_count, status) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.id,
            entry.worker_id,
            entry.date,
            entry.committed,
            entry.outcome.as_str(),
        ],
    )?;
    Ok(())
}

/// The `n` most recent entries, newest first.
pub fn tail_entries(conn: &Connection, n: usize) -> DbResult<Vec<SyncLedgerEntry>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT sync_id, worker_id, date, items_synced_count, status
        FROM sync_log
        ORDER BY date DESC, rowid DESC
        LIMIT ?
        "#,
    )?;
    let rows = stmt.query_map([n as i64], LedgerRow::from_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.try_into()?);
    }
    Ok(entries)
}

/// The `n` most recent entries for one worker, newest first.
pub fn worker_tail(conn: &Connection, worker_id: &str, n: usize) -> DbResult<Vec<SyncLedgerEntry>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT sync_id, worker_id, date, items_synced_count, status
        FROM sync_log
        WHERE worker_id = ?1
        ORDER BY date DESC, rowid DESC
        LIMIT ?2
        "#,
    )?;
    let rows = stmt.query_map(params![worker_id, n as i64], LedgerRow::from_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.try_into()?);
    }
    Ok(entries)
}

/// Fold one worker's entries into a [`LedgerStatus`].
pub fn worker_status(conn: &Connection, worker_id: &str) -> DbResult<LedgerStatus> {
    let mut stmt = conn.prepare(
        r#"
        SELECT sync_id, worker_id, date, items_synced_count, status
        FROM sync_log
        WHERE worker_id = ?
        ORDER BY date, rowid
        "#,
    )?;
    let rows = stmt.query_map([worker_id], LedgerRow::from_row)?;

    let mut entries: Vec<SyncLedgerEntry> = Vec::new();
    for row in rows {
        entries.push(row?.try_into()?);
    }
    Ok(LedgerStatus::from_entries(&entries))
}

impl SyncLedger for Database {
    type Error = DbError;

    fn record(&self, entry: &SyncLedgerEntry) -> DbResult<()> {
        append_entry(&self.conn, entry)
    }

    fn tail(&self, n: usize) -> DbResult<Vec<SyncLedgerEntry>> {
        tail_entries(&self.conn, n)
    }

    fn status_for(&self, worker_id: &str) -> DbResult<LedgerStatus> {
        worker_status(&self.conn, worker_id)
    }
}

/// Intermediate row struct for database mapping.
struct LedgerRow {
    sync_id: String,
    worker_id: String,
    date: String,
    items_synced_count: u32,
    status: String,
}

impl LedgerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sync_id: row.get(0)?,
            worker_id: row.get(1)?,
            date: row.get(2)?,
            items_synced_count: row.get(3)?,
            status: row.get(4)?,
        })
    }
}

impl TryFrom<LedgerRow> for SyncLedgerEntry {
    type Error = DbError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let outcome = LedgerOutcome::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown sync status: {}", row.status)))?;

        Ok(SyncLedgerEntry {
            id: row.sync_id,
            worker_id: row.worker_id,
            date: row.date,
            committed: row.items_synced_count,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_at(worker: &str, date: &str, committed: u32, outcome: LedgerOutcome) -> SyncLedgerEntry {
        let mut entry = SyncLedgerEntry::new(worker, committed, outcome);
        entry.date = date.to_string();
        entry
    }

    #[test]
    fn test_record_and_tail() {
        let db = Database::open_in_memory().unwrap();

        db.record(&entry_at("w1", "2024-01-15T10:00:00Z", 2, LedgerOutcome::Success))
            .unwrap();
        db.record(&entry_at("w1", "2024-01-16T10:00:00Z", 0, LedgerOutcome::Failed))
            .unwrap();
        db.record(&entry_at("w1", "2024-01-17T10:00:00Z", 5, LedgerOutcome::Success))
            .unwrap();

        let tail = db.tail(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].date, "2024-01-17T10:00:00Z");
        assert_eq!(tail[1].outcome, LedgerOutcome::Failed);
    }

    #[test]
    fn test_status_for_worker() {
        let db = Database::open_in_memory().unwrap();

        db.record(&entry_at("w1", "2024-01-15T10:00:00Z", 2, LedgerOutcome::Success))
            .unwrap();
        db.record(&entry_at("w2", "2024-01-16T10:00:00Z", 9, LedgerOutcome::Success))
            .unwrap();
        db.record(&entry_at("w1", "2024-01-17T10:00:00Z", 0, LedgerOutcome::Failed))
            .unwrap();

        let status = db.status_for("w1").unwrap();
        assert_eq!(status.attempts, 2);
        assert_eq!(status.total_committed, 2);
        assert_eq!(status.last_outcome, Some(LedgerOutcome::Failed));
        assert_eq!(status.last_success_at.as_deref(), Some("2024-01-15T10:00:00Z"));

        let nobody = db.status_for("w3").unwrap();
        assert_eq!(nobody.attempts, 0);
    }

    #[test]
    fn test_worker_tail_filters_by_worker() {
        let db = Database::open_in_memory().unwrap();

        db.record(&entry_at("w1", "2024-01-15T10:00:00Z", 2, LedgerOutcome::Success))
            .unwrap();
        db.record(&entry_at("w2", "2024-01-16T10:00:00Z", 9, LedgerOutcome::Success))
            .unwrap();
        db.record(&entry_at("w1", "2024-01-17T10:00:00Z", 0, LedgerOutcome::Failed))
            .unwrap();

        let recent = worker_tail(db.conn(), "w1", 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].date, "2024-01-17T10:00:00Z");
        assert!(recent.iter().all(|e| e.worker_id == "w1"));
    }

    #[test]
    fn test_sync_log_append_only() {
        let db = Database::open_in_memory().unwrap();
        db.record(&SyncLedgerEntry::succeeded("w1", 2)).unwrap();

        let result = db
            .conn()
            .execute("UPDATE sync_log SET items_synced_count = 5", []);
        assert!(result.is_err());

        let result = db.conn().execute("DELETE FROM sync_log", []);
        assert!(result.is_err());
        assert_eq!(db.tail(10).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_entry_id_rejected() {
        let db = Database::open_in_memory().unwrap();
        let entry = SyncLedgerEntry::succeeded("w1", 1);
        db.record(&entry).unwrap();
        assert!(db.record(&entry).is_err());
    }
}
