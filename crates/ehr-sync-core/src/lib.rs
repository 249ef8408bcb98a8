//! EHR Sync Core Library
//!
//! Offline-first record store and sync client for community health worker devices.
//!
//! # Architecture
//!
//! ```text
//!   Worker captures patient / visit / vaccination (offline)
//!                          │
//!            [LOCAL STORE: synced = false]
//!                          │
//!                   Change Tracker
//!          (all patients + unsynced visits/vaccinations)
//!                          │
//!                     Sync Client ──── offline? fail fast, touch nothing
//!                          │
//!                POST /sync/upload (bearer)
//!                          │
//!          ┌───────────────▼───────────────┐
//!          │       Central Aggregator      │
//!          │  one transaction per batch    │
//!          │  upsert by id, stamp owner    │
//!          └───────────────┬───────────────┘
//!                          │ {committed, syncId}
//!                          ▼
//!     mark acknowledged revisions synced + ledger entry (one transaction)
//! ```
//!
//! # Core Principle
//!
//! **A row is never marked synced before the server has acknowledged it.** A crash or
//! network loss at any point costs at most a redundant resend, which upserts absorb.
//!
//! # Modules
//!
//! - [`db`]: SQLite local record store
//! - [`models`]: Domain and wire types (Patient, Visit, VaccinationRecord, Batch, ledger)
//! - [`sync`]: Change tracker, transport and sync client
//! - [`ledger`]: Append-only sync ledger contract

pub mod db;
pub mod ledger;
pub mod models;
pub mod sync;

// Re-export commonly used types
pub use db::{Database, StoreStats};
pub use ledger::SyncLedger;
pub use models::{
    Batch, LedgerOutcome, LedgerStatus, Patient, PatientCategory, SyncLedgerEntry, UploadAck,
    VaccinationRecord, VaccinationStatus, Visit,
};
pub use sync::{
    ChangeTracker, Connectivity, Credentials, HttpTransport, OnlineFlag, SyncClient, SyncConfig,
    SyncError, SyncErrorKind, SyncReport, SyncTransport,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum EhrSyncError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Offline: {0}")]
    Offline(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Partial commit: {0}")]
    PartialCommit(String),

    #[error("Batch rejected: {0}")]
    Rejected(String),

    #[error("Sync in progress: {0}")]
    InProgress(String),
}

impl From<db::DbError> for EhrSyncError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => EhrSyncError::NotFound(what),
            other => EhrSyncError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for EhrSyncError {
    fn from(e: serde_json::Error) -> Self {
        EhrSyncError::SerializationError(e.to_string())
    }
}

impl From<SyncError> for EhrSyncError {
    fn from(e: SyncError) -> Self {
        let message = e.message;
        match e.kind {
            SyncErrorKind::Offline => EhrSyncError::Offline(message),
            SyncErrorKind::Unauthorized => EhrSyncError::Unauthorized(message),
            SyncErrorKind::NetworkFailure => EhrSyncError::NetworkFailure(message),
            SyncErrorKind::ServerError => EhrSyncError::ServerError(message),
            SyncErrorKind::PartialCommit => EhrSyncError::PartialCommit(message),
            SyncErrorKind::Rejected => EhrSyncError::Rejected(message),
            SyncErrorKind::InProgress => EhrSyncError::InProgress(message),
            SyncErrorKind::Storage => EhrSyncError::DatabaseError(message),
        }
    }
}

impl From<sync::TransportError> for EhrSyncError {
    fn from(e: sync::TransportError) -> Self {
        SyncError::from(e).into()
    }
}

impl<T> From<std::sync::PoisonError<T>> for EhrSyncError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        EhrSyncError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path. `config_json` is a
/// [`SyncConfig`] document; omitted fields take their defaults.
#[uniffi::export]
pub fn open_database(
    path: String,
    config_json: Option<String>,
) -> Result<Arc<EhrSyncCore>, EhrSyncError> {
    let db = Database::open(&path)?;
    EhrSyncCore::build(db, config_json)
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory(
    config_json: Option<String>,
) -> Result<Arc<EhrSyncCore>, EhrSyncError> {
    let db = Database::open_in_memory()?;
    EhrSyncCore::build(db, config_json)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe device handle for FFI.
#[derive(uniffi::Object)]
pub struct EhrSyncCore {
    db: Arc<Mutex<Database>>,
    online: Arc<OnlineFlag>,
    client: SyncClient<HttpTransport, Arc<OnlineFlag>>,
}

impl EhrSyncCore {
    fn build(db: Database, config_json: Option<String>) -> Result<Arc<Self>, EhrSyncError> {
        let config = match config_json {
            Some(json) => SyncConfig::from_json(&json)?,
            None => SyncConfig::default(),
        };
        let transport = HttpTransport::new(&config)?;
        let db = Arc::new(Mutex::new(db));
        let online = Arc::new(OnlineFlag::new(false));
        let client = SyncClient::new(db.clone(), transport, online.clone(), config);

        Ok(Arc::new(Self { db, online, client }))
    }
}

#[uniffi::export]
impl EhrSyncCore {
    // =========================================================================
    // Capture Operations
    // =========================================================================

    /// Register a new patient.
    pub fn register_patient(
        &self,
        name: String,
        date_of_birth: String,
        sex: String,
        category: String,
        address: Option<String>,
        language: Option<String>,
    ) -> Result<FfiPatient, EhrSyncError> {
        let category = PatientCategory::parse(&category)
            .ok_or_else(|| EhrSyncError::InvalidInput(format!("unknown category: {}", category)))?;

        let mut patient = Patient::new(name, date_of_birth, sex, category);
        patient.address = address;
        if let Some(language) = language {
            patient.language = language;
        }

        let db = self.db.lock()?;
        db.save_patient(&patient)?;
        Ok(patient.into())
    }

    /// Get a patient by id.
    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatient>, EhrSyncError> {
        let db = self.db.lock()?;
        let patient = db.get_patient(&id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// List patients, newest first.
    pub fn list_patients(&self) -> Result<Vec<FfiPatient>, EhrSyncError> {
        let db = self.db.lock()?;
        let patients = db.list_patients()?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Record a visit happening now. `vitals_json` is a JSON object.
    pub fn record_visit(
        &self,
        patient_id: String,
        vitals_json: Option<String>,
        notes: Option<String>,
        next_visit_date: Option<String>,
    ) -> Result<FfiVisit, EhrSyncError> {
        let mut visit = Visit::new(patient_id);
        if let Some(json) = vitals_json {
            visit.vitals = serde_json::from_str(&json)?;
        }
        visit.notes = notes;
        visit.next_visit_date = next_visit_date;

        let db = self.db.lock()?;
        visit.revision = db.save_visit(&visit)?;
        Ok(FfiVisit::try_from(visit)?)
    }

    /// Schedule a vaccine dose.
    pub fn schedule_vaccination(
        &self,
        patient_id: String,
        vaccine_name: String,
        due_date: String,
    ) -> Result<FfiVaccination, EhrSyncError> {
        let mut record = VaccinationRecord::due(patient_id, vaccine_name, due_date);
        let db = self.db.lock()?;
        record.revision = db.save_vaccination(&record)?;
        Ok(record.into())
    }

    /// Mark a scheduled dose as given.
    pub fn administer_vaccination(
        &self,
        id: String,
        administered_date: String,
    ) -> Result<FfiVaccination, EhrSyncError> {
        let db = self.db.lock()?;
        let record = db.administer_vaccination(&id, &administered_date)?;
        Ok(record.into())
    }

    // =========================================================================
    // Status Operations
    // =========================================================================

    /// Visits and vaccinations waiting for the server.
    pub fn pending_count(&self) -> Result<u64, EhrSyncError> {
        let db = self.db.lock()?;
        Ok(db.pending_count()?)
    }

    /// Aggregate store counts.
    pub fn stats(&self) -> Result<FfiStoreStats, EhrSyncError> {
        let db = self.db.lock()?;
        Ok(db.stats()?.into())
    }

    /// Most recent sync attempts, newest first.
    pub fn ledger_tail(&self, limit: u32) -> Result<Vec<FfiLedgerEntry>, EhrSyncError> {
        let db = self.db.lock()?;
        let entries = db.tail(limit as usize)?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    /// Called by the host app's network listener.
    pub fn set_online(&self, online: bool) {
        self.online.set_online(online);
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl EhrSyncCore {
    /// Upload pending rows.
    pub async fn sync_now(
        &self,
        worker_id: String,
        token: String,
    ) -> Result<FfiSyncReport, EhrSyncError> {
        let report = self.client.sync(&Credentials::new(worker_id, token)).await?;
        Ok(report.into())
    }

    /// Upload every row regardless of sync state.
    pub async fn force_sync_all(
        &self,
        worker_id: String,
        token: String,
    ) -> Result<FfiSyncReport, EhrSyncError> {
        let report = self
            .client
            .force_sync_all(&Credentials::new(worker_id, token))
            .await?;
        Ok(report.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub date_of_birth: String,
    pub sex: String,
    pub category: String,
    pub address: Option<String>,
    pub language: String,
    pub owner_id: Option<String>,
    pub created_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name,
            date_of_birth: patient.date_of_birth,
            sex: patient.sex,
            category: patient.category.as_str().to_string(),
            address: patient.address,
            language: patient.language,
            owner_id: patient.owner_id,
            created_at: patient.created_at,
        }
    }
}

/// FFI-safe visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisit {
    pub id: String,
    pub patient_id: String,
    pub visited_at: String,
    pub vitals_json: String,
    pub notes: Option<String>,
    pub next_visit_date: Option<String>,
    pub synced: bool,
}

impl TryFrom<Visit> for FfiVisit {
    type Error = serde_json::Error;

    fn try_from(visit: Visit) -> Result<Self, Self::Error> {
        Ok(Self {
            vitals_json: serde_json::to_string(&visit.vitals)?,
            id: visit.id,
            patient_id: visit.patient_id,
            visited_at: visit.visited_at,
            notes: visit.notes,
            next_visit_date: visit.next_visit_date,
            synced: visit.synced,
        })
    }
}

/// FFI-safe vaccination record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVaccination {
    pub id: String,
    pub patient_id: String,
    pub vaccine_name: String,
    pub due_date: String,
    pub administered_date: Option<String>,
    pub status: String,
    pub synced: bool,
}

impl From<VaccinationRecord> for FfiVaccination {
    fn from(record: VaccinationRecord) -> Self {
        Self {
            id: record.id,
            patient_id: record.patient_id,
            vaccine_name: record.vaccine_name,
            due_date: record.due_date,
            administered_date: record.administered_date,
            status: record.status.as_str().to_string(),
            synced: record.synced,
        }
    }
}

/// FFI-safe store statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStoreStats {
    pub total_patients: u64,
    pub total_visits: u64,
    pub pending_vaccinations: u64,
    pub unsynced_items: u64,
}

impl From<StoreStats> for FfiStoreStats {
    fn from(stats: StoreStats) -> Self {
        Self {
            total_patients: stats.total_patients,
            total_visits: stats.total_visits,
            pending_vaccinations: stats.pending_vaccinations,
            unsynced_items: stats.unsynced_items,
        }
    }
}

/// FFI-safe ledger entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLedgerEntry {
    pub id: String,
    pub worker_id: String,
    pub date: String,
    pub committed: u32,
    pub outcome: String,
}

impl From<SyncLedgerEntry> for FfiLedgerEntry {
    fn from(entry: SyncLedgerEntry) -> Self {
        Self {
            id: entry.id,
            worker_id: entry.worker_id,
            date: entry.date,
            committed: entry.committed,
            outcome: entry.outcome.as_str().to_string(),
        }
    }
}

/// FFI-safe sync result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSyncReport {
    pub committed: u32,
    pub sync_id: Option<String>,
    pub attempts: u32,
}

impl From<SyncReport> for FfiSyncReport {
    fn from(report: SyncReport) -> Self {
        Self {
            committed: report.committed,
            sync_id: report.sync_id,
            attempts: report.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_through_facade() {
        let core = open_database_in_memory(None).unwrap();

        let patient = core
            .register_patient(
                "Asha Devi".into(),
                "1995-03-15".into(),
                "Female".into(),
                "pregnant".into(),
                Some("Village A".into()),
                None,
            )
            .unwrap();
        assert_eq!(patient.language, "en");

        let visit = core
            .record_visit(
                patient.id.clone(),
                Some(r#"{"bp": "110/70"}"#.into()),
                Some("routine checkup".into()),
                None,
            )
            .unwrap();
        assert!(!visit.synced);

        let dose = core
            .schedule_vaccination(patient.id.clone(), "TT-1".into(), "2024-02-01".into())
            .unwrap();
        core.administer_vaccination(dose.id, "2024-02-02".into())
            .unwrap();

        let stats = core.stats().unwrap();
        assert_eq!(stats.total_patients, 1);
        assert_eq!(stats.unsynced_items, 2);
        assert_eq!(core.pending_count().unwrap(), 2);
    }

    #[test]
    fn test_invalid_category_rejected() {
        let core = open_database_in_memory(None).unwrap();
        let result = core.register_patient(
            "X".into(),
            "2000-01-01".into(),
            "Female".into(),
            "elderly".into(),
            None,
            None,
        );
        assert!(matches!(result, Err(EhrSyncError::InvalidInput(_))));
    }

    #[test]
    fn test_bad_config_json() {
        let result = open_database_in_memory(Some("{not json".into()));
        assert!(matches!(result, Err(EhrSyncError::SerializationError(_))));
    }

    #[tokio::test]
    async fn test_sync_while_offline_touches_nothing() {
        let core = open_database_in_memory(None).unwrap();
        let patient = core
            .register_patient(
                "Ravi Kumar".into(),
                "2020-08-10".into(),
                "Male".into(),
                "child".into(),
                None,
                Some("hi".into()),
            )
            .unwrap();
        core.record_visit(patient.id, None, None, None).unwrap();

        let result = core.sync_now("w1".into(), "token".into()).await;
        assert!(matches!(result, Err(EhrSyncError::Offline(_))));
        assert_eq!(core.pending_count().unwrap(), 1);
        assert!(core.ledger_tail(10).unwrap().is_empty());
    }
}
