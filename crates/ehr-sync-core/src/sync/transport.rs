//! Network seam between the sync client and the central aggregator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use super::SyncConfig;
use crate::models::{Batch, ErrorBody, UploadAck};

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("credential rejected: {0}")]
    Unauthorized(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("batch rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed acknowledgment: {0}")]
    Decode(String),
}

/// Delivers one batch to the aggregator and returns its acknowledgment.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn upload(&self, batch: &Batch, token: &str) -> Result<UploadAck, TransportError>;
}

#[async_trait]
impl<T: SyncTransport + ?Sized> SyncTransport for Arc<T> {
    async fn upload(&self, batch: &Batch, token: &str) -> Result<UploadAck, TransportError> {
        (**self).upload(batch, token).await
    }
}

/// Reports whether the device currently has a usable network.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

impl<T: Connectivity + ?Sized> Connectivity for Arc<T> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}

/// Connectivity flag flipped by the host app's network listener.
#[derive(Debug, Default)]
pub struct OnlineFlag(AtomicBool);

impl OnlineFlag {
    pub fn new(online: bool) -> Self {
        Self(AtomicBool::new(online))
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for OnlineFlag {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// HTTP transport for `POST /sync/upload`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpTransport {
    pub fn new(config: &SyncConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            upload_url: config.upload_url(),
        })
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn upload(&self, batch: &Batch, token: &str) -> Result<UploadAck, TransportError> {
        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(token)
            .json(batch)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<UploadAck>()
                .await
                .map_err(|e| TransportError::Decode(e.to_string()));
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());

        Err(classify_status(status, message))
    }
}

fn classify_status(status: StatusCode, message: String) -> TransportError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Unauthorized(message),
        s if s.is_server_error() => TransportError::Server {
            status: s.as_u16(),
            message,
        },
        s => TransportError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}
