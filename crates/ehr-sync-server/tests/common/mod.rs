//! Shared fixtures for the server integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use ehr_sync_core::models::{Batch, ErrorBody, UploadAck};
use ehr_sync_core::sync::{SyncTransport, TransportError};
use ehr_sync_server::error::StoreResult;
use ehr_sync_server::{create_router, Aggregator, AppState, CentralStore, TokenAuthority};
use rusqlite::types::Value;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";

pub struct TestApp {
    pub router: Router,
    pub store: CentralStore,
    pub tokens: TokenAuthority,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_aggregator(Aggregator::new)
    }

    pub fn with_aggregator(build: impl FnOnce(CentralStore) -> Aggregator) -> Self {
        let store = CentralStore::open_in_memory().unwrap();
        let tokens = TokenAuthority::new(SECRET);
        let aggregator = build(store.clone());
        let router = create_router(AppState::new(aggregator, tokens.clone()));
        Self {
            router,
            store,
            tokens,
        }
    }

    pub fn token(&self, worker: &str) -> String {
        self.tokens
            .issue(worker, "asha", Duration::from_secs(3600))
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn upload(&self, worker: &str, batch: &Batch) -> Response {
        self.send(upload_request(Some(&self.token(worker)), batch))
            .await
    }

    pub async fn get(&self, uri: &str, worker: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {}", self.token(worker)))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub fn transport(&self) -> RouterTransport {
        RouterTransport::new(self.router.clone())
    }

    /// Every row of `table`, ordered by id.
    pub fn rows(&self, table: &str) -> Vec<Vec<Value>> {
        self.store
            .with_conn(|conn| -> StoreResult<Vec<Vec<Value>>> {
                let mut stmt = conn.prepare(&format!("SELECT * FROM {table} ORDER BY id"))?;
                let columns = stmt.column_count();
                let rows = stmt.query_map([], |row| {
                    (0..columns)
                        .map(|i| row.get::<_, Value>(i))
                        .collect::<Result<Vec<_>, _>>()
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .unwrap()
    }

    pub fn count(&self, table: &str) -> i64 {
        self.store
            .with_conn(|conn| -> StoreResult<i64> {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?)
            })
            .unwrap()
    }

    pub fn owner_of(&self, patient_id: &str) -> Option<String> {
        self.store
            .with_conn(|conn| -> StoreResult<Option<String>> {
                Ok(conn.query_row(
                    "SELECT owner_id FROM patients WHERE id = ?",
                    [patient_id],
                    |row| row.get(0),
                )?)
            })
            .unwrap()
    }
}

pub fn upload_request(token: Option<&str>, batch: &Batch) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/sync/upload")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(batch).unwrap()))
        .unwrap()
}

pub async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Drives the in-process router through the same seam a device uses over HTTP.
pub struct RouterTransport {
    router: Router,
    lose_responses: AtomicUsize,
}

impl RouterTransport {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            lose_responses: AtomicUsize::new(0),
        }
    }

    /// The next `n` responses are discarded after the server has handled the request.
    pub fn lose_next_responses(self, n: usize) -> Self {
        self.lose_responses.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl SyncTransport for RouterTransport {
    async fn upload(&self, batch: &Batch, token: &str) -> Result<UploadAck, TransportError> {
        let response = self
            .router
            .clone()
            .oneshot(upload_request(Some(token), batch))
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let lost = self
            .lose_responses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Err(TransportError::Network("connection dropped".into()));
        }

        if status.is_success() {
            return serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()));
        }

        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .map(|b| b.error)
            .unwrap_or_else(|_| status.to_string());
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Unauthorized(message),
            s if s.is_server_error() => TransportError::Server {
                status: s.as_u16(),
                message,
            },
            s => TransportError::Rejected {
                status: s.as_u16(),
                message,
            },
        })
    }
}
