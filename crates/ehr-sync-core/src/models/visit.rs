//! Visit models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured vitals captured during a visit, e.g. `{"bp": "120/80", "weightKg": 54.5}`.
pub type Vitals = BTreeMap<String, serde_json::Value>;

/// A home or clinic visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    /// Client-assigned UUID
    pub id: String,
    /// Patient this visit belongs to
    pub patient_id: String,
    /// When the visit took place
    #[serde(default = "super::now_rfc3339")]
    pub visited_at: String,
    /// Measurements taken
    #[serde(default)]
    pub vitals: Vitals,
    /// Free-text notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Scheduled follow-up date
    #[serde(default)]
    pub next_visit_date: Option<String>,
    /// Whether the server has acknowledged this revision
    #[serde(skip)]
    pub synced: bool,
    /// Local edit counter (device-only)
    #[serde(skip)]
    pub revision: i64,
    /// Creation timestamp
    #[serde(default = "super::now_rfc3339")]
    pub created_at: String,
}

impl Visit {
    /// Create a new visit happening now.
    pub fn new(patient_id: impl Into<String>) -> Self {
        let now = super::now_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.into(),
            visited_at: now.clone(),
            vitals: Vitals::new(),
            notes: None,
            next_visit_date: None,
            synced: false,
            revision: 0,
            created_at: now,
        }
    }
}
