// Proposal lifecycle
//
// draft -> submitted -> {under_review, accepted, rejected}
// submitted | under_review -> withdrawn (vendor only, irreversible)
//
// A vendor holds at most one non-withdrawn proposal per market request.

pub mod lifecycle;
pub mod types;

pub use types::{ComplianceItem, Proposal, ProposalDraft, ProposalStatus, ProposalUpdate};
