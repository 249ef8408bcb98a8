//! HTTP handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use ehr_sync_core::db::{worker_status, worker_tail};
use ehr_sync_core::models::{Batch, LedgerStatus, Patient, SyncLedgerEntry, UploadAck};
use serde::Serialize;

use crate::aggregator::Aggregator;
use crate::auth::{Claims, TokenAuthority};
use crate::error::{AggregatorError, StoreError};
use crate::store::{self, PatientFilter, ServerMetrics};

/// Entries returned by `GET /sync/status`.
const RECENT_ENTRIES: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    pub tokens: TokenAuthority,
}

impl AppState {
    pub fn new(aggregator: Aggregator, tokens: TokenAuthority) -> Self {
        Self { aggregator, tokens }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub status: LedgerStatus,
    pub recent: Vec<SyncLedgerEntry>,
}

/// `POST /sync/upload`
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<Batch>, JsonRejection>,
) -> Result<Json<UploadAck>, AggregatorError> {
    let batch = match body {
        Ok(Json(batch)) => batch,
        Err(rejection) => {
            let err = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AggregatorError::BodyTooLarge(rejection.body_text())
            } else {
                AggregatorError::InvalidBatch(rejection.body_text())
            };
            return Err(state.aggregator.refuse(&claims.sub, err).await);
        }
    };
    let ack = state.aggregator.upload(&claims.sub, batch).await?;
    Ok(Json(ack))
}

/// `GET /sync/status`: the caller's own ledger.
pub async fn sync_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<SyncStatusResponse>, StoreError> {
    let worker = claims.sub;
    let response = state
        .aggregator
        .store()
        .call(move |conn| -> Result<_, StoreError> {
            Ok(SyncStatusResponse {
                status: worker_status(conn, &worker)?,
                recent: worker_tail(conn, &worker, RECENT_ENTRIES)?,
            })
        })
        .await?;
    Ok(Json(response))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Result<Json<ServerMetrics>, StoreError> {
    let metrics = state
        .aggregator
        .store()
        .call(|conn| store::metrics(conn))
        .await?;
    Ok(Json(metrics))
}

/// `GET /patients?ownerId=&village=`
pub async fn patients(
    State(state): State<AppState>,
    Query(filter): Query<PatientFilter>,
) -> Result<Json<Vec<Patient>>, StoreError> {
    let patients = state
        .aggregator
        .store()
        .call(move |conn| store::list_patients(conn, &filter))
        .await?;
    Ok(Json(patients))
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
