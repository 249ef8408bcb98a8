//! Sync ledger models.

use serde::{Deserialize, Serialize};

/// Outcome of one sync attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerOutcome {
    Success,
    Failed,
}

impl LedgerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOutcome::Success => "success",
            LedgerOutcome::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(LedgerOutcome::Success),
            "failed" => Some(LedgerOutcome::Failed),
            _ => None,
        }
    }
}

/// One row of the append-only sync ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncLedgerEntry {
    pub id: String,
    /// Worker whose credential submitted the batch
    pub worker_id: String,
    /// RFC 3339 timestamp of the attempt
    pub date: String,
    /// Rows committed by the central store
    pub committed: u32,
    pub outcome: LedgerOutcome,
}

impl SyncLedgerEntry {
    pub fn new(worker_id: impl Into<String>, committed: u32, outcome: LedgerOutcome) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            worker_id: worker_id.into(),
            date: chrono::Utc::now().to_rfc3339(),
            committed,
            outcome,
        }
    }

    pub fn succeeded(worker_id: impl Into<String>, committed: u32) -> Self {
        Self::new(worker_id, committed, LedgerOutcome::Success)
    }

    pub fn failed(worker_id: impl Into<String>, committed: u32) -> Self {
        Self::new(worker_id, committed, LedgerOutcome::Failed)
    }
}

/// Derived view of a worker's sync history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStatus {
    pub attempts: u32,
    pub last_attempt_at: Option<String>,
    pub last_outcome: Option<LedgerOutcome>,
    pub last_success_at: Option<String>,
    pub total_committed: u64,
}

impl LedgerStatus {
    /// Fold entries (oldest first) into a status summary.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a SyncLedgerEntry>) -> Self {
        let mut status = LedgerStatus::default();
        for entry in entries {
            status.attempts += 1;
            status.last_attempt_at = Some(entry.date.clone());
            status.last_outcome = Some(entry.outcome);
            if entry.outcome == LedgerOutcome::Success {
                status.last_success_at = Some(entry.date.clone());
                status.total_committed += u64::from(entry.committed);
            }
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_entries() {
        let mut first = SyncLedgerEntry::succeeded("w1", 3);
        first.date = "2024-01-15T10:00:00Z".into();
        let mut second = SyncLedgerEntry::failed("w1", 0);
        second.date = "2024-01-16T10:00:00Z".into();

        let status = LedgerStatus::from_entries(&[first, second]);
        assert_eq!(status.attempts, 2);
        assert_eq!(status.last_outcome, Some(LedgerOutcome::Failed));
        assert_eq!(status.last_success_at.as_deref(), Some("2024-01-15T10:00:00Z"));
        assert_eq!(status.last_attempt_at.as_deref(), Some("2024-01-16T10:00:00Z"));
        assert_eq!(status.total_committed, 3);
    }

    #[test]
    fn test_empty_status() {
        let status = LedgerStatus::from_entries(std::iter::empty());
        assert_eq!(status, LedgerStatus::default());
    }
}
