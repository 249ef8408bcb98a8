//! Sync client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings handed to the sync client by the host app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Base URL of the central aggregator
    pub endpoint: String,
    /// Per-request timeout
    pub request_timeout_ms: u64,
    /// Total attempts per sync call, including the first
    pub max_attempts: u32,
    /// First backoff delay; doubles on each retry
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay
    pub max_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000".to_string(),
            request_timeout_ms: 30_000,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl SyncConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// `POST` target for batch uploads.
    pub fn upload_url(&self) -> String {
        format!("{}/sync/upload", self.endpoint.trim_end_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}
