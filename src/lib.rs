// Procurement workflow engine
// Lifecycles for RFP requests, market requests, proposals and contracts,
// the award cascade, contract audits and derived statistics.

pub mod audit;
pub mod auth;
pub mod award;
pub mod cli;
pub mod config;
pub mod contracts;
pub mod engine;
pub mod errors;
pub mod evaluation;
pub mod events;
pub mod market;
pub mod observability;
pub mod proposals;
pub mod rfp;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export key types for easy access
pub use audit::{AuditRecord, AuditRequest, AuditRunner, ComplianceCheck, Finding, FindingStatus, FindingUpdate};
pub use auth::{AuthorizationContext, Role};
pub use award::{plan_award, AwardRequest, AwardTransaction};
pub use config::{config, init_config, EngineConfig};
pub use contracts::{Contract, ContractDraft, ContractStatus, ExpiryOutcome};
pub use engine::{AwardOutcome, Clock, FixedClock, ProcurementEngine, SystemClock};
pub use errors::{EntityKind, WorkflowError, WorkflowResult};
pub use evaluation::{rank_proposals, AiEvaluation, AiIngestOutcome, RankedProposal, ScoreInput, ScoringWeights};
pub use events::{DomainEvent, EventEnvelope, EventSink, RecordingEventSink, TracingEventSink};
pub use market::{MarketRequest, MarketRequestDraft, MarketRequestStatus};
pub use observability::{EngineMetrics, EngineStats, OperationTimer};
pub use proposals::{Proposal, ProposalDraft, ProposalStatus};
pub use rfp::{RfpDraft, RfpRequest, RfpStatus};
pub use stats::{ComplianceBand, ProcurementDashboard, VendorStats};
pub use store::{InMemoryStore, ProcurementStore, Snapshot, StoreError};
pub use telemetry::{create_transition_span, generate_correlation_id, init_telemetry};
pub use types::{ContractId, MarketRequestId, OrganizationId, PrincipalId, ProposalId, RfpRequestId, Severity};
