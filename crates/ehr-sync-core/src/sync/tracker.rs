//! Change tracker: selects what a sync attempt has to send.

use crate::db::{BatchScope, Database, DbResult};
use crate::models::Batch;

/// Reads pending rows out of the local store.
pub struct ChangeTracker<'a> {
    db: &'a Database,
}

impl<'a> ChangeTracker<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Every patient plus all visits and vaccinations with `synced = false`.
    ///
    /// Patients carry no sync flag and are always included so the server
    /// keeps current ownership data.
    pub fn collect_pending(&self) -> DbResult<Batch> {
        self.db.read_batch(BatchScope::Pending)
    }

    /// Every row regardless of sync state (manual reconciliation).
    pub fn collect_all(&self) -> DbResult<Batch> {
        self.db.read_batch(BatchScope::All)
    }

    pub fn collect(&self, scope: BatchScope) -> DbResult<Batch> {
        self.db.read_batch(scope)
    }

    /// Check if any visit or vaccination is waiting for the server.
    pub fn has_unsynced_changes(&self) -> DbResult<bool> {
        Ok(self.db.pending_count()? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, PatientCategory, VaccinationRecord, Visit};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_empty_store_yields_empty_batch() {
        let db = setup_db();
        let tracker = ChangeTracker::new(&db);

        let batch = tracker.collect_pending().unwrap();
        assert!(batch.is_empty());
        assert!(!tracker.has_unsynced_changes().unwrap());
    }

    #[test]
    fn test_patients_always_included() {
        let db = setup_db();
        let tracker = ChangeTracker::new(&db);

        let patient = Patient::with_id("p1", "Asha Devi", "1995-03-15", "Female", PatientCategory::Pregnant);
        db.save_patient(&patient).unwrap();
        db.save_visit(&Visit::new("p1")).unwrap();

        let first = tracker.collect_pending().unwrap();
        db.mark_synced(&first.receipt()).unwrap();

        let second = tracker.collect_pending().unwrap();
        assert_eq!(second.patients.len(), 1);
        assert!(second.visits.is_empty());
        assert!(!tracker.has_unsynced_changes().unwrap());
    }

    #[test]
    fn test_collect_all_ignores_flags() {
        let db = setup_db();
        let tracker = ChangeTracker::new(&db);

        let patient = Patient::with_id("c1", "Ravi Kumar", "2020-08-10", "Male", PatientCategory::Child);
        db.save_patient(&patient).unwrap();
        db.save_visit(&Visit::new("c1")).unwrap();
        db.save_vaccination(&VaccinationRecord::due("c1", "OPV-1", "2024-02-01"))
            .unwrap();

        let pending = tracker.collect_pending().unwrap();
        db.mark_synced(&pending.receipt()).unwrap();

        let all = tracker.collect_all().unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.visits.iter().all(|v| v.synced));
        assert!(all.vaccinations.iter().all(|v| v.synced));
    }
}
