//! Vaccination database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{VaccinationRecord, VaccinationStatus};

const VACCINATION_COLUMNS: &str =
    "id, patient_id, vaccine_name, due_date, administered_date, status, synced, revision";

impl Database {
    /// Insert or update a vaccination record; marks it pending again.
    pub fn save_vaccination(&self, record: &VaccinationRecord) -> DbResult<i64> {
        let revision = self.conn.query_row(
            r#"
            INSERT INTO vaccinations (
                id, patient_id, vaccine_name, due_date,
                administered_date, status, synced, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 1)
            ON CONFLICT(id) DO UPDATE SET
                patient_id = excluded.patient_id,
                vaccine_name = excluded.vaccine_name,
                due_date = excluded.due_date,
                administered_date = excluded.administered_date,
                status = excluded.status,
                synced = 0,
                revision = vaccinations.revision + 1
            RETURNING revision
            "#,
            params![
                record.id,
                record.patient_id,
                record.vaccine_name,
                record.due_date,
                record.administered_date,
                record.status.as_str(),
            ],
            |row| row.get(0),
        )?;
        Ok(revision)
    }

    /// Get a vaccination record by id.
    pub fn get_vaccination(&self, id: &str) -> DbResult<Option<VaccinationRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {VACCINATION_COLUMNS} FROM vaccinations WHERE id = ?"),
                [id],
                VaccinationRow::from_row,
            )
            .optional()?
            .map(VaccinationRecord::try_from)
            .transpose()
    }

    /// Record a dose as administered on `date`.
    pub fn administer_vaccination(&self, id: &str, date: &str) -> DbResult<VaccinationRecord> {
        let mut record = self
            .get_vaccination(id)?
            .ok_or_else(|| DbError::NotFound(format!("vaccination {id}")))?;
        record.administer(date);
        record.revision = self.save_vaccination(&record)?;
        record.synced = false;
        Ok(record)
    }

    /// List a patient's vaccinations by due date.
    pub fn list_vaccinations_for_patient(&self, patient_id: &str) -> DbResult<Vec<VaccinationRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VACCINATION_COLUMNS} FROM vaccinations WHERE patient_id = ? ORDER BY due_date"
        ))?;
        let rows = stmt.query_map([patient_id], VaccinationRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }
}

/// Vaccinations in creation order, optionally restricted to unsynced rows.
pub(super) fn query_vaccinations(
    conn: &Connection,
    include_synced: bool,
) -> DbResult<Vec<VaccinationRecord>> {
    let filter = if include_synced { "" } else { "WHERE synced = 0" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {VACCINATION_COLUMNS} FROM vaccinations {filter} ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map([], VaccinationRow::from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.try_into()?);
    }
    Ok(records)
}

pub(super) fn flag_synced(conn: &Connection, rows: &[(String, i64)]) -> DbResult<usize> {
    let mut stmt =
        conn.prepare("UPDATE vaccinations SET synced = 1 WHERE id = ?1 AND revision = ?2")?;
    let mut updated = 0;
    for (id, revision) in rows {
        updated += stmt.execute(params![id, revision])?;
    }
    Ok(updated)
}

struct VaccinationRow {
    id: String,
    patient_id: String,
    vaccine_name: String,
    due_date: String,
    administered_date: Option<String>,
    status: String,
    synced: bool,
    revision: i64,
}

impl VaccinationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            vaccine_name: row.get(2)?,
            due_date: row.get(3)?,
            administered_date: row.get(4)?,
            status: row.get(5)?,
            synced: row.get(6)?,
            revision: row.get(7)?,
        })
    }
}

impl TryFrom<VaccinationRow> for VaccinationRecord {
    type Error = DbError;

    fn try_from(row: VaccinationRow) -> Result<Self, Self::Error> {
        let status = VaccinationStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown vaccination status: {}", row.status)))?;

        Ok(VaccinationRecord {
            id: row.id,
            patient_id: row.patient_id,
            vaccine_name: row.vaccine_name,
            due_date: row.due_date,
            administered_date: row.administered_date,
            status,
            synced: row.synced,
            revision: row.revision,
        })
    }
}
