//! Sync batch and acknowledgment types shared by device and server.

use serde::{Deserialize, Serialize};

use super::{Patient, VaccinationRecord, Visit};

/// Pending records collected for one sync attempt. This is also the
/// `POST /sync/upload` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub visits: Vec<Visit>,
    #[serde(default)]
    pub vaccinations: Vec<VaccinationRecord>,
}

impl Batch {
    /// Total rows across all three collections.
    pub fn len(&self) -> usize {
        self.patients.len() + self.visits.len() + self.vaccinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids and revisions of the rows in this batch, used to mark them synced
    /// once the server acknowledges.
    pub fn receipt(&self) -> BatchReceipt {
        BatchReceipt {
            patient_ids: self.patients.iter().map(|p| p.id.clone()).collect(),
            visits: self
                .visits
                .iter()
                .map(|v| (v.id.clone(), v.revision))
                .collect(),
            vaccinations: self
                .vaccinations
                .iter()
                .map(|v| (v.id.clone(), v.revision))
                .collect(),
        }
    }
}

/// The `(id, revision)` pairs that were sent in a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReceipt {
    pub patient_ids: Vec<String>,
    pub visits: Vec<(String, i64)>,
    pub vaccinations: Vec<(String, i64)>,
}

/// Server acknowledgment for an uploaded batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadAck {
    /// Rows upserted by the central store
    pub committed: u32,
    /// Ledger entry id on the server
    pub sync_id: String,
}

/// Error body returned by the server for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientCategory;

    #[test]
    fn test_missing_collections_default_to_empty() {
        let batch: Batch = serde_json::from_str(r#"{"visits": []}"#).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_receipt_tracks_revisions() {
        let patient = Patient::with_id("p1", "Asha Devi", "1995-03-15", "Female", PatientCategory::Pregnant);
        let mut visit = Visit::new("p1");
        visit.revision = 2;

        let batch = Batch {
            patients: vec![patient],
            visits: vec![visit.clone()],
            vaccinations: vec![],
        };

        let receipt = batch.receipt();
        assert_eq!(batch.len(), 2);
        assert_eq!(receipt.patient_ids, vec!["p1".to_string()]);
        assert_eq!(receipt.visits, vec![(visit.id, 2)]);
    }

    #[test]
    fn test_ack_wire_format() {
        let ack: UploadAck = serde_json::from_str(r#"{"committed": 2, "syncId": "s-1"}"#).unwrap();
        assert_eq!(ack.committed, 2);
        assert_eq!(ack.sync_id, "s-1");
    }
}
