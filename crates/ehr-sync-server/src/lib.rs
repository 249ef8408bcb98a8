//! EHR Sync Server
//!
//! Central aggregator for device sync batches. Devices `POST /sync/upload`
//! with a bearer token; each batch is applied to the central SQLite store in
//! one transaction and logged in the server's append-only sync ledger.

pub mod aggregator;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod store;

pub use aggregator::{Aggregator, OwnershipPolicy, DEFAULT_OWNERSHIP_POLICY};
pub use auth::{Claims, TokenAuthority};
pub use error::{AggregatorError, AuthError, StoreError};
pub use handlers::AppState;
pub use routes::create_router;
pub use store::CentralStore;
