//! Vaccination models.

use serde::{Deserialize, Serialize};

/// Vaccination status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VaccinationStatus {
    Due,
    Administered,
}

impl VaccinationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaccinationStatus::Due => "due",
            VaccinationStatus::Administered => "administered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "due" => Some(VaccinationStatus::Due),
            "administered" => Some(VaccinationStatus::Administered),
            _ => None,
        }
    }
}

/// A scheduled or administered vaccine dose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VaccinationRecord {
    /// Client-assigned UUID
    pub id: String,
    /// Patient receiving the dose
    pub patient_id: String,
    /// Vaccine name (e.g. "OPV-1")
    pub vaccine_name: String,
    /// Due date
    pub due_date: String,
    /// Date the dose was given
    #[serde(default)]
    pub administered_date: Option<String>,
    /// Current status
    pub status: VaccinationStatus,
    #[serde(skip)]
    pub synced: bool,
    #[serde(skip)]
    pub revision: i64,
}

impl VaccinationRecord {
    /// Schedule a dose that is due on `due_date`.
    pub fn due(
        patient_id: impl Into<String>,
        vaccine_name: impl Into<String>,
        due_date: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.into(),
            vaccine_name: vaccine_name.into(),
            due_date: due_date.into(),
            administered_date: None,
            status: VaccinationStatus::Due,
            synced: false,
            revision: 0,
        }
    }

    /// Record the dose as given.
    pub fn administer(&mut self, date: impl Into<String>) {
        self.administered_date = Some(date.into());
        self.status = VaccinationStatus::Administered;
    }
}
