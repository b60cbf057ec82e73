use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::evaluation::{AiEvaluation, EvaluationScores, Recommendation};
use crate::types::{MarketRequestId, OrganizationId, PrincipalId, ProposalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Submitted,
    UnderReview,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 6] = [
        ProposalStatus::Draft,
        ProposalStatus::Submitted,
        ProposalStatus::UnderReview,
        ProposalStatus::Accepted,
        ProposalStatus::Rejected,
        ProposalStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Submitted => "submitted",
            ProposalStatus::UnderReview => "under_review",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Withdrawn => "withdrawn",
        }
    }

    /// Counts toward the one-proposal-per-vendor rule
    pub fn is_active(&self) -> bool {
        !matches!(self, ProposalStatus::Withdrawn)
    }

    /// Waiting on a decision from the buying organization
    pub fn is_pending_decision(&self) -> bool {
        matches!(self, ProposalStatus::Submitted | ProposalStatus::UnderReview)
    }

    /// Has been handed to the buying organization at some point
    pub fn is_submitted_or_later(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Submitted
                | ProposalStatus::UnderReview
                | ProposalStatus::Accepted
                | ProposalStatus::Rejected
        )
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProposalStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown proposal status '{s}'"))
    }
}

/// One row of the vendor's requirement compliance matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceItem {
    pub requirement: String,
    pub compliant: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDraft {
    pub proposed_item: String,
    pub description: String,
    pub total_price: f64,
    pub currency: String,
    pub delivery_time_days: Option<u32>,
    pub technical_proposal: Option<String>,
    pub commercial_proposal: Option<String>,
    #[serde(default)]
    pub compliance_matrix: Vec<ComplianceItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalUpdate {
    pub proposed_item: Option<String>,
    pub description: Option<String>,
    pub total_price: Option<f64>,
    pub currency: Option<String>,
    pub delivery_time_days: Option<u32>,
    pub technical_proposal: Option<String>,
    pub commercial_proposal: Option<String>,
    pub compliance_matrix: Option<Vec<ComplianceItem>>,
}

/// A vendor's response to a market request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: ProposalId,
    pub market_request_id: MarketRequestId,
    pub vendor_id: PrincipalId,
    pub vendor_organization_id: OrganizationId,
    pub proposed_item: String,
    pub description: String,
    pub total_price: f64,
    pub currency: String,
    pub delivery_time_days: Option<u32>,
    pub technical_proposal: Option<String>,
    pub commercial_proposal: Option<String>,
    #[serde(default)]
    pub compliance_matrix: Vec<ComplianceItem>,
    pub status: ProposalStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub evaluation_scores: Option<EvaluationScores>,
    pub evaluation_notes: Option<String>,
    pub recommendation: Option<Recommendation>,
    pub evaluated_by: Option<PrincipalId>,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub ai_evaluation: Option<AiEvaluation>,
    pub rejection_reason: Option<String>,
    pub manager_notes: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Proposal {
    /// Share of compliance matrix rows marked compliant, if any rows exist
    pub fn compliance_ratio(&self) -> Option<f64> {
        if self.compliance_matrix.is_empty() {
            return None;
        }
        let compliant = self.compliance_matrix.iter().filter(|item| item.compliant).count();
        Some(compliant as f64 / self.compliance_matrix.len() as f64)
    }
}
