//! Patient models.

use serde::{Deserialize, Serialize};

/// Registration category of a patient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatientCategory {
    Pregnant,
    Child,
}

impl PatientCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientCategory::Pregnant => "pregnant",
            PatientCategory::Child => "child",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pregnant" => Some(PatientCategory::Pregnant),
            "child" => Some(PatientCategory::Child),
            _ => None,
        }
    }
}

/// A patient record. The id is assigned on the device so patients can be
/// registered without talking to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Client-assigned UUID
    pub id: String,
    /// Full name
    pub name: String,
    /// Date of birth (ISO 8601 date)
    #[serde(default)]
    pub date_of_birth: String,
    /// Sex as recorded at registration
    #[serde(default)]
    pub sex: String,
    /// Registration category
    #[serde(rename = "type")]
    pub category: PatientCategory,
    /// Free-text address
    #[serde(default)]
    pub address: Option<String>,
    /// Preferred language code
    #[serde(default = "default_language")]
    pub language: String,
    /// Owning worker, stamped by the central store on upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Creation timestamp
    #[serde(default = "super::now_rfc3339")]
    pub created_at: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(
        name: impl Into<String>,
        date_of_birth: impl Into<String>,
        sex: impl Into<String>,
        category: PatientCategory,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            date_of_birth: date_of_birth.into(),
            sex: sex.into(),
            category,
            address: None,
            language: default_language(),
            owner_id: None,
            created_at: super::now_rfc3339(),
        }
    }

    /// Same as [`Patient::new`] with a caller-chosen id.
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        date_of_birth: impl Into<String>,
        sex: impl Into<String>,
        category: PatientCategory,
    ) -> Self {
        let mut patient = Self::new(name, date_of_birth, sex, category);
        patient.id = id.into();
        patient
    }
}
