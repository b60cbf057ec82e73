use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{MarketRequestId, OrganizationId, PrincipalId, RfpRequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfpStatus {
    Draft,
    Review,
    Approved,
    Rejected,
}

impl RfpStatus {
    pub const ALL: [RfpStatus; 4] = [RfpStatus::Draft, RfpStatus::Review, RfpStatus::Approved, RfpStatus::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            RfpStatus::Draft => "draft",
            RfpStatus::Review => "review",
            RfpStatus::Approved => "approved",
            RfpStatus::Rejected => "rejected",
        }
    }

    /// The owner may still change the content
    pub fn is_editable(&self) -> bool {
        matches!(self, RfpStatus::Draft | RfpStatus::Rejected)
    }
}

impl fmt::Display for RfpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RfpStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RfpStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown RFP status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Reviewer decision stamped on approve or reject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerApproval {
    pub decided_by: PrincipalId,
    pub approved: bool,
    pub decided_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfpDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub urgency: Urgency,
    pub budget_estimate: Option<f64>,
    pub currency: String,
    pub quantity: Option<u32>,
    pub justification: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub specifications: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfpUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub urgency: Option<Urgency>,
    pub budget_estimate: Option<f64>,
    pub currency: Option<String>,
    pub quantity: Option<u32>,
    pub justification: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub requirements: Option<Vec<String>>,
    pub specifications: Option<String>,
}

/// Internal procurement need awaiting organizational approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfpRequest {
    pub id: RfpRequestId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub urgency: Urgency,
    pub budget_estimate: Option<f64>,
    pub currency: String,
    pub quantity: Option<u32>,
    pub justification: Option<String>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub specifications: Option<String>,
    pub status: RfpStatus,
    pub created_by: PrincipalId,
    pub organization_id: OrganizationId,
    pub review_notes: Option<String>,
    pub manager_approval: Option<ManagerApproval>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub converted_to: Option<MarketRequestId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}
