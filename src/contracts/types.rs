use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::audit::AuditRecord;
use crate::types::{ContractId, MarketRequestId, OrganizationId, PrincipalId, ProposalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Pending,
    Active,
    Expired,
    Terminated,
    Completed,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 6] = [
        ContractStatus::Draft,
        ContractStatus::Pending,
        ContractStatus::Active,
        ContractStatus::Expired,
        ContractStatus::Terminated,
        ContractStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Pending => "pending",
            ContractStatus::Active => "active",
            ContractStatus::Expired => "expired",
            ContractStatus::Terminated => "terminated",
            ContractStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContractStatus::Expired | ContractStatus::Terminated | ContractStatus::Completed
        )
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContractStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown contract status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    #[default]
    FixedPrice,
    TimeAndMaterials,
    Framework,
    ServiceLevel,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDraft {
    pub title: String,
    pub vendor_id: PrincipalId,
    pub market_request_id: Option<MarketRequestId>,
    pub value: f64,
    pub currency: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "type", default)]
    pub contract_type: ContractType,
    pub category: String,
    #[serde(default)]
    pub auto_renewal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: ContractId,
    pub title: String,
    pub vendor_id: PrincipalId,
    pub organization_id: OrganizationId,
    pub market_request_id: Option<MarketRequestId>,
    pub proposal_id: Option<ProposalId>,
    pub value: f64,
    pub currency: String,
    pub status: ContractStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub contract_type: ContractType,
    pub category: String,
    pub auto_renewal: bool,
    #[serde(default)]
    pub renewal_count: u32,
    pub termination_reason: Option<String>,
    pub created_by: PrincipalId,
    /// Append-only audit history, oldest first
    #[serde(default)]
    pub audits: Vec<AuditRecord>,
    pub activated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Contract {
    pub fn latest_audit(&self) -> Option<&AuditRecord> {
        self.audits.last()
    }

    /// Whole days left until the end date, negative once past it
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.end_date.map(|end| (end - now).num_days())
    }
}
