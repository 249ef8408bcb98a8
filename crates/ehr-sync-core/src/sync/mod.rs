//! Offline-first sync: change tracking, transport and the sync client.
//!
//! Protocol:
//! 1. Tracker collects every patient plus unsynced visits and vaccinations
//! 2. Client uploads the batch with the worker's bearer token
//! 3. Aggregator upserts the batch in one transaction and acks `{committed, syncId}`
//! 4. Client marks the acknowledged revisions synced and appends a ledger entry

mod client;
mod config;
mod error;
mod tracker;
mod transport;

pub use client::*;
pub use config::*;
pub use error::*;
pub use tracker::*;
pub use transport::*;
