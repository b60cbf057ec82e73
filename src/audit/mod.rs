// Contract audit sub-workflow
//
// Each audit run appends an immutable AuditRecord to its contract. Only the
// status, resolution and assignee of individual findings change afterwards:
//
//   open -> acknowledged -> resolved -> closed
//   open -> resolved
//
// Nothing leaves closed and a resolved finding is never reopened.

pub mod findings;
pub mod runner;
pub mod types;

pub use findings::FindingChange;
pub use runner::{
    AuditRequest, AuditRunner, CarriedFindingsCheck, ComplianceCheck, ContractValueCheck, DateConsistencyCheck,
    ExpiryWithoutRenewalCheck, NewFinding, PastDueCheck,
};
pub use types::{AuditRecord, AuditType, Finding, FindingStatus, FindingUpdate, SeverityPenalties};
