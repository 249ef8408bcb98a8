//! Server error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ehr_sync_core::db::DbError;
use ehr_sync_core::models::ErrorBody;
use thiserror::Error;

/// Central store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Ledger error: {0}")]
    Db(#[from] DbError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Reasons an upload is refused.
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("{0}")]
    InvalidBatch(String),

    #[error("Batch of {rows} rows exceeds the limit of {limit}")]
    BatchTooLarge { rows: usize, limit: usize },

    #[error("{0}")]
    BodyTooLarge(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for AggregatorError {
    fn from(e: rusqlite::Error) -> Self {
        AggregatorError::Store(e.into())
    }
}

impl From<DbError> for AggregatorError {
    fn from(e: DbError) -> Self {
        AggregatorError::Store(e.into())
    }
}

/// Bearer credential failures.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Access token required")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token creation failed: {0}")]
    Issue(String),
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "central store failure");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
    }
}

impl IntoResponse for AggregatorError {
    fn into_response(self) -> Response {
        match self {
            AggregatorError::InvalidBatch(_) => {
                error_response(StatusCode::BAD_REQUEST, self.to_string())
            }
            AggregatorError::BatchTooLarge { .. } | AggregatorError::BodyTooLarge(_) => {
                error_response(StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            AggregatorError::Store(e) => e.into_response(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken => {
                error_response(StatusCode::UNAUTHORIZED, self.to_string())
            }
            AuthError::Issue(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        }
    }
}
