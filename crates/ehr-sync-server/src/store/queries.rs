//! Read-only dashboard queries.

use ehr_sync_core::db::{count_all, PatientRow, PATIENT_COLUMNS};
use ehr_sync_core::models::Patient;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Program-wide counts for the PHC dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerMetrics {
    pub total_patients: u64,
    pub total_visits: u64,
    pub pending_vaccinations: u64,
    /// Sync attempts logged since midnight UTC
    pub synced_today: u64,
}

const METRIC_QUERIES: [&str; 4] = [
    "SELECT COUNT(*) FROM patients",
    "SELECT COUNT(*) FROM visits",
    "SELECT COUNT(*) FROM vaccinations WHERE status = 'due'",
    "SELECT COUNT(*) FROM sync_log WHERE substr(date, 1, 10) = date('now')",
];

pub fn metrics(conn: &Connection) -> StoreResult<ServerMetrics> {
    let [total_patients, total_visits, pending_vaccinations, synced_today] =
        count_all(conn, METRIC_QUERIES)?;

    Ok(ServerMetrics {
        total_patients,
        total_visits,
        pending_vaccinations,
        synced_today,
    })
}

/// Optional filters for the patient listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFilter {
    /// Exact owning worker
    pub owner_id: Option<String>,
    /// Substring of the address
    pub village: Option<String>,
}

/// Patients matching `filter`, newest first.
pub fn list_patients(conn: &Connection, filter: &PatientFilter) -> StoreResult<Vec<Patient>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {PATIENT_COLUMNS} FROM patients
        WHERE (?1 IS NULL OR owner_id = ?1)
          AND (?2 IS NULL OR address LIKE '%' || ?2 || '%')
        ORDER BY created_at DESC, id
        "#
    ))?;
    let rows = stmt.query_map(params![filter.owner_id, filter.village], PatientRow::from_row)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(Patient::try_from(row?)?);
    }
    Ok(patients)
}
