// Error taxonomy for the procurement workflow engine

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::auth::Role;
use crate::store::StoreError;

/// Entities managed by the engine, used to label errors and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    RfpRequest,
    MarketRequest,
    Proposal,
    Contract,
    AuditRecord,
    Finding,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::RfpRequest => "RFP request",
            EntityKind::MarketRequest => "market request",
            EntityKind::Proposal => "proposal",
            EntityKind::Contract => "contract",
            EntityKind::AuditRecord => "audit record",
            EntityKind::Finding => "finding",
        };
        f.write_str(label)
    }
}

/// Typed failures returned by every transition. The engine never retries.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {message}")]
    Validation { message: String, fields: Vec<String> },

    #[error("Principal {principal} ({role}) is not allowed to {action}")]
    Authorization {
        principal: String,
        role: Role,
        action: String,
    },

    #[error("Cannot {attempted} {entity} {id} while it is '{current}'")]
    InvalidState {
        entity: EntityKind,
        id: String,
        current: String,
        attempted: String,
    },

    #[error("Vendor {vendor_id} already holds active proposal {existing} for market request {market_request_id}")]
    DuplicateProposal {
        vendor_id: String,
        market_request_id: String,
        existing: String,
    },

    #[error("Market request {market_request_id} has already been awarded")]
    AlreadyAwarded { market_request_id: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateActiveProposal {
                vendor_id,
                market_request_id,
                existing,
            } => WorkflowError::DuplicateProposal {
                vendor_id,
                market_request_id,
                existing,
            },
            StoreError::Missing { entity, id } => WorkflowError::NotFound { entity, id },
            other => WorkflowError::Store(other),
        }
    }
}

impl WorkflowError {
    /// Stable label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation { .. } => "validation_error",
            WorkflowError::Authorization { .. } => "authorization_error",
            WorkflowError::InvalidState { .. } => "invalid_state_error",
            WorkflowError::DuplicateProposal { .. } => "duplicate_proposal_error",
            WorkflowError::AlreadyAwarded { .. } => "already_awarded_error",
            WorkflowError::NotFound { .. } => "not_found_error",
            WorkflowError::Store(_) => "store_error",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Validation failure naming the offending fields
    pub fn missing_fields(fields: Vec<&str>) -> Self {
        WorkflowError::Validation {
            message: format!("missing required fields: {}", fields.join(", ")),
            fields: fields.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn invalid_state(
        entity: EntityKind,
        id: impl fmt::Display,
        current: impl fmt::Display,
        attempted: &str,
    ) -> Self {
        WorkflowError::InvalidState {
            entity,
            id: id.to_string(),
            current: current.to_string(),
            attempted: attempted.to_string(),
        }
    }

    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        WorkflowError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message_names_current_and_attempted() {
        let err = WorkflowError::invalid_state(EntityKind::MarketRequest, "m-1", "draft", "close");
        assert_eq!(err.to_string(), "Cannot close market request m-1 while it is 'draft'");
        assert_eq!(err.kind(), "invalid_state_error");
    }

    #[test]
    fn test_store_errors_map_onto_taxonomy() {
        let err: WorkflowError = StoreError::Missing {
            entity: EntityKind::Contract,
            id: "c-1".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "not_found_error");

        let err: WorkflowError = StoreError::VersionConflict {
            entity: EntityKind::Proposal,
            id: "p-1".to_string(),
            expected: 1,
            found: 2,
        }
        .into();
        assert_eq!(err.kind(), "store_error");
    }

    #[test]
    fn test_missing_fields_lists_every_field() {
        let err = WorkflowError::missing_fields(vec!["budgetEstimate", "category"]);
        match err {
            WorkflowError::Validation { message, fields } => {
                assert!(message.contains("budgetEstimate, category"));
                assert_eq!(fields, vec!["budgetEstimate".to_string(), "category".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
