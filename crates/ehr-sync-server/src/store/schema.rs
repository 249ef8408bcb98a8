//! Central store schema.
//!
//! Same record layout as the device store, minus the device-local
//! bookkeeping columns. `sync_log` comes from [`ehr_sync_core::db::SYNC_LOG_SCHEMA`].

pub const CENTRAL_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    date_of_birth TEXT NOT NULL,
    sex TEXT NOT NULL,
    category TEXT NOT NULL CHECK (category IN ('pregnant', 'child')),
    address TEXT,
    language TEXT NOT NULL DEFAULT 'en',
    owner_id TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_owner ON patients(owner_id);

CREATE TABLE IF NOT EXISTS visits (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    visited_at TEXT NOT NULL,
    vitals TEXT NOT NULL DEFAULT '{}',
    notes TEXT,
    next_visit_date TEXT,
    synced INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_visits_patient ON visits(patient_id);

CREATE TABLE IF NOT EXISTS vaccinations (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    vaccine_name TEXT NOT NULL,
    due_date TEXT NOT NULL,
    administered_date TEXT,
    status TEXT NOT NULL CHECK (status IN ('due', 'administered')),
    synced INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_vaccinations_patient ON vaccinations(patient_id);
CREATE INDEX IF NOT EXISTS idx_vaccinations_status ON vaccinations(status);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CENTRAL_SCHEMA).unwrap();
        conn.execute_batch(CENTRAL_SCHEMA).unwrap();
    }

    #[test]
    fn test_visit_requires_patient() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CENTRAL_SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO visits (id, patient_id, visited_at, created_at) VALUES ('v1', 'ghost', 'now', 'now')",
            [],
        );
        assert!(result.is_err());
    }
}
