//! Domain models for the EHR sync subsystem.

mod batch;
mod ledger;
mod patient;
mod vaccination;
mod visit;

pub use batch::*;
pub use ledger::*;
pub use patient::*;
pub use vaccination::*;
pub use visit::*;

/// Current UTC time as RFC 3339, the timestamp format used on the wire.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
