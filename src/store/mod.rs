// Persistence boundary
//
// Every entity carries a version. A save succeeds only when the stored copy
// still has the version the caller loaded, then bumps it by one. The award
// cascade, proposal insertion and RFP conversion are applied as single
// all-or-nothing units.

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::award::AwardTransaction;
use crate::contracts::{Contract, ContractStatus};
use crate::errors::EntityKind;
use crate::market::{MarketRequest, MarketRequestStatus};
use crate::proposals::{Proposal, ProposalStatus};
use crate::rfp::{RfpRequest, RfpStatus};
use crate::types::{ContractId, MarketRequestId, OrganizationId, PrincipalId, ProposalId, RfpRequestId};

pub use memory::InMemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        entity: EntityKind,
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("Vendor {vendor_id} already holds active proposal {existing} for market request {market_request_id}")]
    DuplicateActiveProposal {
        vendor_id: String,
        market_request_id: String,
        existing: String,
    },

    #[error("{entity} {id} does not exist")]
    Missing { entity: EntityKind, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Bookkeeping both stores need from every persisted entity
pub trait StoredEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;
    const TABLE: &'static str;

    fn key(&self) -> &str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
    fn status_label(&self) -> &'static str;
    fn organization(&self) -> &str;
    fn owner(&self) -> &str;

    /// Parent market request, where there is one
    fn reference(&self) -> Option<&str> {
        None
    }
}

impl StoredEntity for RfpRequest {
    const KIND: EntityKind = EntityKind::RfpRequest;
    const TABLE: &'static str = "rfp_requests";

    fn key(&self) -> &str {
        self.id.as_str()
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }
    fn organization(&self) -> &str {
        self.organization_id.as_str()
    }
    fn owner(&self) -> &str {
        self.created_by.as_str()
    }
}

impl StoredEntity for MarketRequest {
    const KIND: EntityKind = EntityKind::MarketRequest;
    const TABLE: &'static str = "market_requests";

    fn key(&self) -> &str {
        self.id.as_str()
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }
    fn organization(&self) -> &str {
        self.organization_id.as_str()
    }
    fn owner(&self) -> &str {
        self.created_by.as_str()
    }
}

impl StoredEntity for Proposal {
    const KIND: EntityKind = EntityKind::Proposal;
    const TABLE: &'static str = "proposals";

    fn key(&self) -> &str {
        self.id.as_str()
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }
    fn organization(&self) -> &str {
        self.vendor_organization_id.as_str()
    }
    fn owner(&self) -> &str {
        self.vendor_id.as_str()
    }
    fn reference(&self) -> Option<&str> {
        Some(self.market_request_id.as_str())
    }
}

impl StoredEntity for Contract {
    const KIND: EntityKind = EntityKind::Contract;
    const TABLE: &'static str = "contracts";

    fn key(&self) -> &str {
        self.id.as_str()
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }
    fn organization(&self) -> &str {
        self.organization_id.as_str()
    }
    fn owner(&self) -> &str {
        self.vendor_id.as_str()
    }
    fn reference(&self) -> Option<&str> {
        self.market_request_id.as_ref().map(|id| id.as_str())
    }
}

/// Check `expected` against the stored version, `None` meaning not stored yet
pub(crate) fn check_version<T: StoredEntity>(id: &str, expected: u64, stored: Option<u64>) -> StoreResult<()> {
    let found = stored.unwrap_or(0);
    if found == expected {
        Ok(())
    } else {
        Err(StoreError::VersionConflict {
            entity: T::KIND,
            id: id.to_string(),
            expected,
            found,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RfpFilter {
    pub status: Option<RfpStatus>,
    pub organization_id: Option<OrganizationId>,
    pub created_by: Option<PrincipalId>,
}

impl RfpFilter {
    pub fn matches(&self, rfp: &RfpRequest) -> bool {
        self.status.is_none_or(|s| rfp.status == s)
            && self.organization_id.as_ref().is_none_or(|o| &rfp.organization_id == o)
            && self.created_by.as_ref().is_none_or(|c| &rfp.created_by == c)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketRequestFilter {
    pub status: Option<MarketRequestStatus>,
    pub organization_id: Option<OrganizationId>,
    pub created_by: Option<PrincipalId>,
    /// Only published or active requests
    pub open_only: bool,
}

impl MarketRequestFilter {
    pub fn matches(&self, market: &MarketRequest) -> bool {
        self.status.is_none_or(|s| market.status == s)
            && self.organization_id.as_ref().is_none_or(|o| &market.organization_id == o)
            && self.created_by.as_ref().is_none_or(|c| &market.created_by == c)
            && (!self.open_only || market.status.is_open())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProposalFilter {
    pub market_request_id: Option<MarketRequestId>,
    pub vendor_id: Option<PrincipalId>,
    pub status: Option<ProposalStatus>,
}

impl ProposalFilter {
    pub fn for_market(id: &MarketRequestId) -> Self {
        Self {
            market_request_id: Some(id.clone()),
            ..Default::default()
        }
    }

    pub fn for_vendor(id: &PrincipalId) -> Self {
        Self {
            vendor_id: Some(id.clone()),
            ..Default::default()
        }
    }

    pub fn matches(&self, proposal: &Proposal) -> bool {
        self.market_request_id.as_ref().is_none_or(|m| &proposal.market_request_id == m)
            && self.vendor_id.as_ref().is_none_or(|v| &proposal.vendor_id == v)
            && self.status.is_none_or(|s| proposal.status == s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContractFilter {
    pub status: Option<ContractStatus>,
    pub organization_id: Option<OrganizationId>,
    pub vendor_id: Option<PrincipalId>,
    pub market_request_id: Option<MarketRequestId>,
}

impl ContractFilter {
    pub fn for_market(id: &MarketRequestId) -> Self {
        Self {
            market_request_id: Some(id.clone()),
            ..Default::default()
        }
    }

    pub fn matches(&self, contract: &Contract) -> bool {
        self.status.is_none_or(|s| contract.status == s)
            && self.organization_id.as_ref().is_none_or(|o| &contract.organization_id == o)
            && self.vendor_id.as_ref().is_none_or(|v| &contract.vendor_id == v)
            && self
                .market_request_id
                .as_ref()
                .is_none_or(|m| contract.market_request_id.as_ref() == Some(m))
    }
}

/// Repository boundary of the workflow engine. Saves take the entity as
/// loaded and return the stored copy with its new version.
#[async_trait]
pub trait ProcurementStore: Send + Sync {
    async fn load_rfp(&self, id: &RfpRequestId) -> StoreResult<Option<RfpRequest>>;
    async fn save_rfp(&self, rfp: &RfpRequest) -> StoreResult<RfpRequest>;
    async fn query_rfps(&self, filter: &RfpFilter) -> StoreResult<Vec<RfpRequest>>;
    async fn delete_rfp(&self, id: &RfpRequestId, expected_version: u64) -> StoreResult<()>;

    async fn load_market(&self, id: &MarketRequestId) -> StoreResult<Option<MarketRequest>>;
    async fn save_market(&self, market: &MarketRequest) -> StoreResult<MarketRequest>;
    async fn query_markets(&self, filter: &MarketRequestFilter) -> StoreResult<Vec<MarketRequest>>;
    async fn delete_market(&self, id: &MarketRequestId, expected_version: u64) -> StoreResult<()>;

    async fn load_proposal(&self, id: &ProposalId) -> StoreResult<Option<Proposal>>;
    async fn save_proposal(&self, proposal: &Proposal) -> StoreResult<Proposal>;
    async fn query_proposals(&self, filter: &ProposalFilter) -> StoreResult<Vec<Proposal>>;
    /// Remove a proposal and detach it from its market request
    async fn delete_proposal(&self, id: &ProposalId, expected_version: u64) -> StoreResult<()>;

    async fn load_contract(&self, id: &ContractId) -> StoreResult<Option<Contract>>;
    async fn save_contract(&self, contract: &Contract) -> StoreResult<Contract>;
    async fn query_contracts(&self, filter: &ContractFilter) -> StoreResult<Vec<Contract>>;

    /// Insert a new proposal unless its vendor already holds a non-withdrawn
    /// one for the same market request. Check and insert are one step; the
    /// proposal is also attached to its market request.
    async fn insert_proposal_exclusive(&self, proposal: &Proposal) -> StoreResult<Proposal>;

    /// Apply every delta of an award or none of them
    async fn apply_award(&self, tx: &AwardTransaction) -> StoreResult<()>;

    /// Persist a converted RFP together with the market request it produced
    async fn apply_conversion(&self, rfp: &RfpRequest, market: &MarketRequest) -> StoreResult<(RfpRequest, MarketRequest)>;
}

/// Plain dump of every entity, used for import/export and the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub rfp_requests: Vec<RfpRequest>,
    #[serde(default)]
    pub market_requests: Vec<MarketRequest>,
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
}

impl Snapshot {
    pub async fn read_from(path: impl AsRef<Path>) -> StoreResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn write_to(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, raw).await?;
        Ok(())
    }

    pub fn proposals_for(&self, market: &MarketRequestId) -> Vec<Proposal> {
        self.proposals
            .iter()
            .filter(|p| &p.market_request_id == market)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_version_check() {
        assert!(check_version::<Proposal>("p1", 0, None).is_ok());
        assert!(check_version::<Proposal>("p1", 3, Some(3)).is_ok());
        let err = check_version::<Proposal>("p1", 2, Some(3)).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 2, found: 3, .. }));
    }

    #[test]
    fn test_filters() {
        let market = published_market(&officer());
        assert!(MarketRequestFilter { open_only: true, ..Default::default() }.matches(&market));
        assert!(!MarketRequestFilter {
            status: Some(MarketRequestStatus::Closed),
            ..Default::default()
        }
        .matches(&market));

        let proposal = Proposal::create(&vendor("v1"), &market, proposal_draft(10.0), now()).unwrap();
        assert!(ProposalFilter::for_market(&market.id).matches(&proposal));
        assert!(!ProposalFilter::for_vendor(&"v2".into()).matches(&proposal));
    }
}
