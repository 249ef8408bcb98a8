//! Patient database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Patient, PatientCategory};

/// Column order expected by [`PatientRow::from_row`].
pub const PATIENT_COLUMNS: &str =
    "id, name, date_of_birth, sex, category, address, language, owner_id, created_at";

impl Database {
    /// Insert or update a patient (upsert by id).
    pub fn save_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, name, date_of_birth, sex, category,
                address, language, owner_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                date_of_birth = excluded.date_of_birth,
                sex = excluded.sex,
                category = excluded.category,
                address = excluded.address,
                language = excluded.language
            "#,
            params![
                patient.id,
                patient.name,
                patient.date_of_birth,
                patient.sex,
                patient.category.as_str(),
                patient.address,
                patient.language,
                patient.owner_id,
                patient.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a patient by id.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?"),
                [id],
                PatientRow::from_row,
            )
            .optional()?
            .map(Patient::try_from)
            .transpose()
    }

    /// List all patients, newest first.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut patients = query_patients(&self.conn)?;
        patients.reverse();
        Ok(patients)
    }

    /// When the patient was last acknowledged by the server.
    pub fn patient_synced_at(&self, id: &str) -> DbResult<Option<String>> {
        let synced_at: Option<Option<String>> = self
            .conn
            .query_row("SELECT synced_at FROM patients WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .optional()?;
        synced_at.ok_or_else(|| DbError::NotFound(format!("patient {id}")))
    }
}

/// All patients in creation order.
pub(super) fn query_patients(conn: &Connection) -> DbResult<Vec<Patient>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map([], PatientRow::from_row)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(row?.try_into()?);
    }
    Ok(patients)
}

/// Record an acknowledged upload for each id.
pub(super) fn stamp_synced(conn: &Connection, ids: &[String], now: &str) -> DbResult<usize> {
    let mut stmt = conn.prepare("UPDATE patients SET synced_at = ?1 WHERE id = ?2")?;
    let mut updated = 0;
    for id in ids {
        updated += stmt.execute(params![now, id])?;
    }
    Ok(updated)
}

/// Intermediate row struct for database mapping.
///
/// The central store keeps the same patient columns and maps through this too.
pub struct PatientRow {
    id: String,
    name: String,
    date_of_birth: String,
    sex: String,
    category: String,
    address: Option<String>,
    language: String,
    owner_id: Option<String>,
    created_at: String,
}

impl PatientRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            date_of_birth: row.get(2)?,
            sex: row.get(3)?,
            category: row.get(4)?,
            address: row.get(5)?,
            language: row.get(6)?,
            owner_id: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let category = PatientCategory::parse(&row.category)
            .ok_or_else(|| DbError::Constraint(format!("Unknown patient category: {}", row.category)))?;

        Ok(Patient {
            id: row.id,
            name: row.name,
            date_of_birth: row.date_of_birth,
            sex: row.sex,
            category,
            address: row.address,
            language: row.language,
            owner_id: row.owner_id,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_save_and_get() {
        let db = setup_db();

        let mut patient = Patient::new("Priya Sharma", "1995-03-15", "Female", PatientCategory::Pregnant);
        patient.address = Some("Village A, Block B".into());
        patient.language = "hi".into();

        db.save_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved, patient);
    }

    #[test]
    fn test_save_twice_updates_in_place() {
        let db = setup_db();

        let mut patient = Patient::new("Ravi Kumar", "2020-08-10", "Male", PatientCategory::Child);
        db.save_patient(&patient).unwrap();

        patient.address = Some("Village C".into());
        db.save_patient(&patient).unwrap();

        let all = db.list_patients().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].address, Some("Village C".into()));
    }

    #[test]
    fn test_synced_at_stamp() {
        let db = setup_db();

        let patient = Patient::with_id("p1", "Asha Devi", "1995-03-15", "Female", PatientCategory::Pregnant);
        db.save_patient(&patient).unwrap();
        assert_eq!(db.patient_synced_at("p1").unwrap(), None);

        let updated = stamp_synced(db.conn(), &["p1".to_string()], "2024-01-15T10:00:00Z").unwrap();
        assert_eq!(updated, 1);
        assert_eq!(
            db.patient_synced_at("p1").unwrap().as_deref(),
            Some("2024-01-15T10:00:00Z")
        );

        assert!(matches!(db.patient_synced_at("nobody"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_get_missing_patient() {
        let db = setup_db();
        assert!(db.get_patient("nope").unwrap().is_none());
    }
}
