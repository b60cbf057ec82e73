// RFP request lifecycle
//
// draft -> review -> {approved, rejected}; rejected -> draft on re-edit.
// Conversion of an approved request into a market request is an explicit
// operation and happens at most once.

pub mod lifecycle;
pub mod types;

pub use types::{ManagerApproval, RfpDraft, RfpRequest, RfpStatus, RfpUpdate, Urgency};
