use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::evaluation::ScoringWeights;
use crate::types::{MarketRequestId, OrganizationId, PrincipalId, ProposalId, RfpRequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRequestStatus {
    Draft,
    Published,
    Active,
    Closed,
    Awarded,
    Cancelled,
}

impl MarketRequestStatus {
    pub const ALL: [MarketRequestStatus; 6] = [
        MarketRequestStatus::Draft,
        MarketRequestStatus::Published,
        MarketRequestStatus::Active,
        MarketRequestStatus::Closed,
        MarketRequestStatus::Awarded,
        MarketRequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRequestStatus::Draft => "draft",
            MarketRequestStatus::Published => "published",
            MarketRequestStatus::Active => "active",
            MarketRequestStatus::Closed => "closed",
            MarketRequestStatus::Awarded => "awarded",
            MarketRequestStatus::Cancelled => "cancelled",
        }
    }

    /// Accepting proposals
    pub fn is_open(&self) -> bool {
        matches!(self, MarketRequestStatus::Published | MarketRequestStatus::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MarketRequestStatus::Closed | MarketRequestStatus::Awarded | MarketRequestStatus::Cancelled
        )
    }
}

impl fmt::Display for MarketRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketRequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown market request status '{s}'"))
    }
}

/// Input for a new market request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRequestDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub budget: Option<f64>,
    pub currency: String,
    pub deadline: Option<DateTime<Utc>>,
    pub quantity: Option<u32>,
    pub specifications: Option<String>,
    pub evaluation_criteria: Option<ScoringWeights>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

/// Partial edit of a draft market request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRequestUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub budget: Option<f64>,
    pub currency: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub quantity: Option<u32>,
    pub specifications: Option<String>,
    pub evaluation_criteria: Option<ScoringWeights>,
    pub requirements: Option<Vec<String>>,
}

/// Procurement opportunity vendors respond to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRequest {
    pub id: MarketRequestId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub budget: Option<f64>,
    pub currency: String,
    pub deadline: Option<DateTime<Utc>>,
    pub quantity: Option<u32>,
    pub specifications: Option<String>,
    pub evaluation_criteria: Option<ScoringWeights>,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub status: MarketRequestStatus,
    pub created_by: PrincipalId,
    pub organization_id: OrganizationId,
    pub source_rfp_request_id: Option<RfpRequestId>,
    #[serde(default)]
    pub proposals: Vec<ProposalId>,
    #[serde(default)]
    pub views_count: u64,
    pub close_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub awarded_proposal_id: Option<ProposalId>,
    pub published_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub awarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}
