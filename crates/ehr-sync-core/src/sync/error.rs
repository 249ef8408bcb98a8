//! Sync error taxonomy.

use serde::Serialize;
use thiserror::Error;

use super::TransportError;
use crate::db::DbError;

/// What went wrong during a sync call. None of these leave a row marked
/// synced that the server has not acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncErrorKind {
    /// No connectivity; nothing was attempted
    Offline,
    /// Credential missing or rejected; re-authenticate before retrying
    Unauthorized,
    /// Timeout, reset or refused connection
    NetworkFailure,
    /// Server answered 5xx or with an unreadable acknowledgment
    ServerError,
    /// Server committed fewer rows than were sent
    PartialCommit,
    /// Server refused the batch as invalid (4xx)
    Rejected,
    /// Another sync is already running on this device
    InProgress,
    /// The local store failed
    Storage,
}

impl SyncErrorKind {
    /// Whether a later retry of the same batch can succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncErrorKind::NetworkFailure | SyncErrorKind::ServerError)
    }
}

/// Structured sync failure returned to the caller.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind:?}: {message}")]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn offline() -> Self {
        Self::new(SyncErrorKind::Offline, "no network connectivity")
    }
}

impl From<TransportError> for SyncError {
    fn from(e: TransportError) -> Self {
        let kind = match &e {
            TransportError::Unauthorized(_) => SyncErrorKind::Unauthorized,
            TransportError::Network(_) => SyncErrorKind::NetworkFailure,
            TransportError::Server { .. } | TransportError::Decode(_) => SyncErrorKind::ServerError,
            TransportError::Rejected { .. } => SyncErrorKind::Rejected,
        };
        SyncError::new(kind, e.to_string())
    }
}

impl From<DbError> for SyncError {
    fn from(e: DbError) -> Self {
        SyncError::new(SyncErrorKind::Storage, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_mapping() {
        let err: SyncError = TransportError::Server {
            status: 503,
            message: "unavailable".into(),
        }
        .into();
        assert_eq!(err.kind, SyncErrorKind::ServerError);
        assert!(err.kind.is_retryable());

        let err: SyncError = TransportError::Unauthorized("Invalid token".into()).into();
        assert_eq!(err.kind, SyncErrorKind::Unauthorized);
        assert!(!err.kind.is_retryable());

        let err: SyncError = TransportError::Rejected {
            status: 400,
            message: "unknown patient".into(),
        }
        .into();
        assert_eq!(err.kind, SyncErrorKind::Rejected);
        assert!(!err.kind.is_retryable());
    }
}
