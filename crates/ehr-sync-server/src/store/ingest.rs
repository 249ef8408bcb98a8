//! Batch upserts into the central store.

use std::collections::HashSet;

use ehr_sync_core::models::{Batch, Patient, VaccinationRecord, Visit};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::aggregator::OwnershipPolicy;
use crate::error::{AggregatorError, StoreResult};

const UPSERT_PATIENT_LAST_WRITER: &str = r#"
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
        language = excluded.language,
        owner_id = excluded.owner_id
"#;

const UPSERT_PATIENT_FIRST_WRITER: &str = r#"
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
        language = excluded.language,
        owner_id = COALESCE(patients.owner_id, excluded.owner_id)
"#;

const UPSERT_VISIT: &str = r#"
    INSERT INTO visits (
        id, patient_id, visited_at, vitals, notes, next_visit_date, synced, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
    ON CONFLICT(id) DO UPDATE SET
        patient_id = excluded.patient_id,
        visited_at = excluded.visited_at,
        vitals = excluded.vitals,
        notes = excluded.notes,
        next_visit_date = excluded.next_visit_date,
        synced = 1
"#;

const UPSERT_VACCINATION: &str = r#"
    INSERT INTO vaccinations (
        id, patient_id, vaccine_name, due_date, administered_date, status, synced
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
    ON CONFLICT(id) DO UPDATE SET
        patient_id = excluded.patient_id,
        vaccine_name = excluded.vaccine_name,
        due_date = excluded.due_date,
        administered_date = excluded.administered_date,
        status = excluded.status,
        synced = 1
"#;

/// Upsert every row of `batch`, stamping patients with `owner_id`.
/// Returns the number of rows written.
///
/// Runs inside the caller's transaction; nothing here commits.
pub fn apply_batch(
    tx: &Transaction<'_>,
    batch: &Batch,
    owner_id: &str,
    policy: OwnershipPolicy,
) -> StoreResult<usize> {
    let mut written = 0;

    let patient_sql = match policy {
        OwnershipPolicy::LastWriterWins => UPSERT_PATIENT_LAST_WRITER,
        OwnershipPolicy::FirstWriterWins => UPSERT_PATIENT_FIRST_WRITER,
    };
    let mut stmt = tx.prepare_cached(patient_sql)?;
    for patient in &batch.patients {
        written += upsert_patient(&mut stmt, patient, owner_id)?;
    }

    let mut stmt = tx.prepare_cached(UPSERT_VISIT)?;
    for visit in &batch.visits {
        written += upsert_visit(&mut stmt, visit)?;
    }

    let mut stmt = tx.prepare_cached(UPSERT_VACCINATION)?;
    for record in &batch.vaccinations {
        written += upsert_vaccination(&mut stmt, record)?;
    }

    Ok(written)
}

fn upsert_patient(
    stmt: &mut rusqlite::CachedStatement<'_>,
    patient: &Patient,
    owner_id: &str,
) -> StoreResult<usize> {
    Ok(stmt.execute(params![
        patient.id,
        patient.name,
        patient.date_of_birth,
        patient.sex,
        patient.category.as_str(),
        patient.address,
        patient.language,
        owner_id,
        patient.created_at,
    ])?)
}

fn upsert_visit(stmt: &mut rusqlite::CachedStatement<'_>, visit: &Visit) -> StoreResult<usize> {
    let vitals = serde_json::to_string(&visit.vitals)?;
    Ok(stmt.execute(params![
        visit.id,
        visit.patient_id,
        visit.visited_at,
        vitals,
        visit.notes,
        visit.next_visit_date,
        visit.created_at,
    ])?)
}

fn upsert_vaccination(
    stmt: &mut rusqlite::CachedStatement<'_>,
    record: &VaccinationRecord,
) -> StoreResult<usize> {
    Ok(stmt.execute(params![
        record.id,
        record.patient_id,
        record.vaccine_name,
        record.due_date,
        record.administered_date,
        record.status.as_str(),
    ])?)
}

/// Check that every row has an id and every visit or vaccination points at
/// a patient in the batch or already stored.
pub fn validate_batch(conn: &Connection, batch: &Batch) -> Result<(), AggregatorError> {
    let mut batch_patients = HashSet::new();
    for patient in &batch.patients {
        if patient.id.trim().is_empty() {
            return Err(AggregatorError::InvalidBatch("patient with empty id".into()));
        }
        batch_patients.insert(patient.id.as_str());
    }

    let references = batch
        .visits
        .iter()
        .map(|v| ("visit", v.id.as_str(), v.patient_id.as_str()))
        .chain(
            batch
                .vaccinations
                .iter()
                .map(|v| ("vaccination", v.id.as_str(), v.patient_id.as_str())),
        );

    for (kind, id, patient_id) in references {
        if id.trim().is_empty() {
            return Err(AggregatorError::InvalidBatch(format!("{kind} with empty id")));
        }
        if batch_patients.contains(patient_id) {
            continue;
        }
        if !patient_exists(conn, patient_id)? {
            return Err(AggregatorError::InvalidBatch(format!(
                "{kind} {id} references unknown patient {patient_id}"
            )));
        }
    }

    Ok(())
}

pub fn patient_exists(conn: &Connection, id: &str) -> StoreResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM patients WHERE id = ?", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}
