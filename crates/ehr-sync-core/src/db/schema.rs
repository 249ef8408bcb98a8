//! SQLite schema definition for the on-device store.

/// Complete local database schema.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients (always re-sent; synced_at is informational)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    date_of_birth TEXT NOT NULL,
    sex TEXT NOT NULL,
    category TEXT NOT NULL CHECK (category IN ('pregnant', 'child')),
    address TEXT,
    language TEXT NOT NULL DEFAULT 'en',
    owner_id TEXT,
    synced_at TEXT,                              -- last acknowledged upload
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_created ON patients(created_at);

-- ============================================================================
-- Visits
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    visited_at TEXT NOT NULL,
    vitals TEXT NOT NULL DEFAULT '{}',           -- JSON object
    notes TEXT,
    next_visit_date TEXT,
    synced INTEGER NOT NULL DEFAULT 0,
    revision INTEGER NOT NULL DEFAULT 1,         -- bumped on every local save
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_visits_patient ON visits(patient_id);
CREATE INDEX IF NOT EXISTS idx_visits_synced ON visits(synced);

-- ============================================================================
-- Vaccinations
-- ============================================================================

CREATE TABLE IF NOT EXISTS vaccinations (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    vaccine_name TEXT NOT NULL,
    due_date TEXT NOT NULL,
    administered_date TEXT,
    status TEXT NOT NULL DEFAULT 'due' CHECK (status IN ('due', 'administered')),
    synced INTEGER NOT NULL DEFAULT 0,
    revision INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_vaccinations_patient ON vaccinations(patient_id);
CREATE INDEX IF NOT EXISTS idx_vaccinations_synced ON vaccinations(synced);

-- sync_log is defined in SYNC_LOG_SCHEMA
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_visit_requires_patient() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO visits (id, patient_id, visited_at) VALUES ('v1', 'missing', '2024-01-15')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_vaccination_status_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute(
            "INSERT INTO patients (id, name, date_of_birth, sex, category) VALUES ('p1', 'Asha', '1995-03-15', 'Female', 'pregnant')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO vaccinations (id, patient_id, vaccine_name, due_date, status) VALUES ('x1', 'p1', 'TT-1', '2024-02-01', 'skipped')",
            [],
        );
        assert!(result.is_err());
    }
}
