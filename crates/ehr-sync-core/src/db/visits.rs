//! Visit database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Visit, Vitals};

const VISIT_COLUMNS: &str =
    "id, patient_id, visited_at, vitals, notes, next_visit_date, synced, revision, created_at";

impl Database {
    /// Insert or update a visit. Every save marks the visit pending again
    /// and bumps its revision; the new revision is returned.
    pub fn save_visit(&self, visit: &Visit) -> DbResult<i64> {
        let vitals_json = serde_json::to_string(&visit.vitals)?;

        let revision = self.conn.query_row(
            r#"
            INSERT INTO visits (
                id, patient_id, visited_at, vitals, notes,
                next_visit_date, synced, revision, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 1, ?7)
            ON CONFLICT(id) DO UPDATE SET
                patient_id = excluded.patient_id,
                visited_at = excluded.visited_at,
                vitals = excluded.vitals,
                notes = excluded.notes,
                next_visit_date = excluded.next_visit_date,
                synced = 0,
                revision = visits.revision + 1
            RETURNING revision
            "#,
            params![
                visit.id,
                visit.patient_id,
                visit.visited_at,
                vitals_json,
                visit.notes,
                visit.next_visit_date,
                visit.created_at,
            ],
            |row| row.get(0),
        )?;
        Ok(revision)
    }

    /// Get a visit by id.
    pub fn get_visit(&self, id: &str) -> DbResult<Option<Visit>> {
        self.conn
            .query_row(
                &format!("SELECT {VISIT_COLUMNS} FROM visits WHERE id = ?"),
                [id],
                VisitRow::from_row,
            )
            .optional()?
            .map(Visit::try_from)
            .transpose()
    }

    /// List visits for a patient, most recent first.
    pub fn list_visits_for_patient(&self, patient_id: &str) -> DbResult<Vec<Visit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits WHERE patient_id = ? ORDER BY visited_at DESC"
        ))?;
        let rows = stmt.query_map([patient_id], VisitRow::from_row)?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }
}

/// Visits in creation order, optionally restricted to unsynced rows.
pub(super) fn query_visits(conn: &Connection, include_synced: bool) -> DbResult<Vec<Visit>> {
    let filter = if include_synced { "" } else { "WHERE synced = 0" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {VISIT_COLUMNS} FROM visits {filter} ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map([], VisitRow::from_row)?;

    let mut visits = Vec::new();
    for row in rows {
        visits.push(row?.try_into()?);
    }
    Ok(visits)
}

/// Flip `synced` for each `(id, revision)` whose revision is unchanged.
pub(super) fn flag_synced(conn: &Connection, rows: &[(String, i64)]) -> DbResult<usize> {
    let mut stmt = conn.prepare("UPDATE visits SET synced = 1 WHERE id = ?1 AND revision = ?2")?;
    let mut updated = 0;
    for (id, revision) in rows {
        updated += stmt.execute(params![id, revision])?;
    }
    Ok(updated)
}

/// Intermediate row struct for database mapping.
struct VisitRow {
    id: String,
    patient_id: String,
    visited_at: String,
    vitals: String,
    notes: Option<String>,
    next_visit_date: Option<String>,
    synced: bool,
    revision: i64,
    created_at: String,
}

impl VisitRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            visited_at: row.get(2)?,
            vitals: row.get(3)?,
            notes: row.get(4)?,
            next_visit_date: row.get(5)?,
            synced: row.get(6)?,
            revision: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl TryFrom<VisitRow> for Visit {
    type Error = DbError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        let vitals: Vitals = serde_json::from_str(&row.vitals)?;

        Ok(Visit {
            id: row.id,
            patient_id: row.patient_id,
            visited_at: row.visited_at,
            vitals,
            notes: row.notes,
            next_visit_date: row.next_visit_date,
            synced: row.synced,
            revision: row.revision,
            created_at: row.created_at,
        })
    }
}
