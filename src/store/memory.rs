// In-memory store backed by a single tokio RwLock. Compound operations run
// under one write guard, which makes them atomic.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    check_version, ContractFilter, MarketRequestFilter, ProcurementStore, ProposalFilter, RfpFilter, Snapshot,
    StoreError, StoreResult, StoredEntity,
};
use crate::award::AwardTransaction;
use crate::contracts::Contract;
use crate::market::MarketRequest;
use crate::proposals::Proposal;
use crate::rfp::RfpRequest;
use crate::types::{ContractId, MarketRequestId, ProposalId, RfpRequestId};

#[derive(Debug, Default, Clone)]
struct State {
    rfps: HashMap<String, RfpRequest>,
    markets: HashMap<String, MarketRequest>,
    proposals: HashMap<String, Proposal>,
    contracts: HashMap<String, Contract>,
}

fn stage<T: StoredEntity>(map: &HashMap<String, T>, entity: &T) -> StoreResult<T> {
    check_version::<T>(entity.key(), entity.version(), map.get(entity.key()).map(|e| e.version()))?;
    let mut next = entity.clone();
    next.set_version(entity.version() + 1);
    Ok(next)
}

fn commit<T: StoredEntity>(map: &mut HashMap<String, T>, entity: T) {
    map.insert(entity.key().to_string(), entity);
}

fn save_into<T: StoredEntity>(map: &mut HashMap<String, T>, entity: &T) -> StoreResult<T> {
    let next = stage(map, entity)?;
    commit(map, next.clone());
    debug!(entity = %T::KIND, id = entity.key(), version = next.version(), "Saved entity");
    Ok(next)
}

fn remove_from<T: StoredEntity>(map: &mut HashMap<String, T>, id: &str, expected_version: u64) -> StoreResult<T> {
    let stored = map.get(id).ok_or_else(|| StoreError::Missing {
        entity: T::KIND,
        id: id.to_string(),
    })?;
    check_version::<T>(id, expected_version, Some(stored.version()))?;
    map.remove(id).ok_or_else(|| StoreError::Missing {
        entity: T::KIND,
        id: id.to_string(),
    })
}

fn query<T: StoredEntity>(map: &HashMap<String, T>, matches: impl Fn(&T) -> bool) -> Vec<T> {
    let mut found: Vec<T> = map.values().filter(|e| matches(e)).cloned().collect();
    found.sort_by(|a, b| a.key().cmp(b.key()));
    found
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a snapshot. Versions are kept as exported.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = State::default();
        for rfp in snapshot.rfp_requests {
            commit(&mut state.rfps, rfp);
        }
        for market in snapshot.market_requests {
            commit(&mut state.markets, market);
        }
        for proposal in snapshot.proposals {
            commit(&mut state.proposals, proposal);
        }
        for contract in snapshot.contracts {
            commit(&mut state.contracts, contract);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        Snapshot {
            rfp_requests: query(&state.rfps, |_| true),
            market_requests: query(&state.markets, |_| true),
            proposals: query(&state.proposals, |_| true),
            contracts: query(&state.contracts, |_| true),
        }
    }
}

#[async_trait]
impl ProcurementStore for InMemoryStore {
    async fn load_rfp(&self, id: &RfpRequestId) -> StoreResult<Option<RfpRequest>> {
        Ok(self.state.read().await.rfps.get(id.as_str()).cloned())
    }

    async fn save_rfp(&self, rfp: &RfpRequest) -> StoreResult<RfpRequest> {
        save_into(&mut self.state.write().await.rfps, rfp)
    }

    async fn query_rfps(&self, filter: &RfpFilter) -> StoreResult<Vec<RfpRequest>> {
        Ok(query(&self.state.read().await.rfps, |r| filter.matches(r)))
    }

    async fn delete_rfp(&self, id: &RfpRequestId, expected_version: u64) -> StoreResult<()> {
        remove_from(&mut self.state.write().await.rfps, id.as_str(), expected_version)?;
        Ok(())
    }

    async fn load_market(&self, id: &MarketRequestId) -> StoreResult<Option<MarketRequest>> {
        Ok(self.state.read().await.markets.get(id.as_str()).cloned())
    }

    async fn save_market(&self, market: &MarketRequest) -> StoreResult<MarketRequest> {
        save_into(&mut self.state.write().await.markets, market)
    }

    async fn query_markets(&self, filter: &MarketRequestFilter) -> StoreResult<Vec<MarketRequest>> {
        Ok(query(&self.state.read().await.markets, |m| filter.matches(m)))
    }

    async fn delete_market(&self, id: &MarketRequestId, expected_version: u64) -> StoreResult<()> {
        remove_from(&mut self.state.write().await.markets, id.as_str(), expected_version)?;
        Ok(())
    }

    async fn load_proposal(&self, id: &ProposalId) -> StoreResult<Option<Proposal>> {
        Ok(self.state.read().await.proposals.get(id.as_str()).cloned())
    }

    async fn save_proposal(&self, proposal: &Proposal) -> StoreResult<Proposal> {
        save_into(&mut self.state.write().await.proposals, proposal)
    }

    async fn query_proposals(&self, filter: &ProposalFilter) -> StoreResult<Vec<Proposal>> {
        Ok(query(&self.state.read().await.proposals, |p| filter.matches(p)))
    }

    async fn delete_proposal(&self, id: &ProposalId, expected_version: u64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let removed = remove_from(&mut state.proposals, id.as_str(), expected_version)?;
        if let Some(market) = state.markets.get_mut(removed.market_request_id.as_str()) {
            market.detach_proposal(id);
            market.version += 1;
        }
        Ok(())
    }

    async fn load_contract(&self, id: &ContractId) -> StoreResult<Option<Contract>> {
        Ok(self.state.read().await.contracts.get(id.as_str()).cloned())
    }

    async fn save_contract(&self, contract: &Contract) -> StoreResult<Contract> {
        save_into(&mut self.state.write().await.contracts, contract)
    }

    async fn query_contracts(&self, filter: &ContractFilter) -> StoreResult<Vec<Contract>> {
        Ok(query(&self.state.read().await.contracts, |c| filter.matches(c)))
    }

    async fn insert_proposal_exclusive(&self, proposal: &Proposal) -> StoreResult<Proposal> {
        let mut state = self.state.write().await;
        let market_key = proposal.market_request_id.as_str();
        if !state.markets.contains_key(market_key) {
            return Err(StoreError::Missing {
                entity: MarketRequest::KIND,
                id: market_key.to_string(),
            });
        }
        if let Some(existing) = state.proposals.values().find(|p| {
            p.id != proposal.id
                && p.vendor_id == proposal.vendor_id
                && p.market_request_id == proposal.market_request_id
                && p.status.is_active()
        }) {
            return Err(StoreError::DuplicateActiveProposal {
                vendor_id: proposal.vendor_id.to_string(),
                market_request_id: proposal.market_request_id.to_string(),
                existing: existing.id.to_string(),
            });
        }

        let stored = stage(&state.proposals, proposal)?;
        commit(&mut state.proposals, stored.clone());
        if let Some(market) = state.markets.get_mut(market_key) {
            market.attach_proposal(&stored.id);
            market.version += 1;
        }
        Ok(stored)
    }

    async fn apply_award(&self, tx: &AwardTransaction) -> StoreResult<()> {
        let mut state = self.state.write().await;

        // Stage everything first; nothing is written unless every check passes.
        let market = stage(&state.markets, &tx.market)?;
        let mut proposals = Vec::with_capacity(tx.rejected.len() + 1);
        for proposal in tx.proposals() {
            proposals.push(stage(&state.proposals, proposal)?);
        }
        let contract = match &tx.new_contract {
            Some(contract) => Some(stage(&state.contracts, contract)?),
            None => None,
        };

        commit(&mut state.markets, market);
        for proposal in proposals {
            commit(&mut state.proposals, proposal);
        }
        if let Some(contract) = contract {
            commit(&mut state.contracts, contract);
        }
        debug!(market_request_id = %tx.market.id, rejected = tx.rejected.len(), "Applied award transaction");
        Ok(())
    }

    async fn apply_conversion(&self, rfp: &RfpRequest, market: &MarketRequest) -> StoreResult<(RfpRequest, MarketRequest)> {
        let mut state = self.state.write().await;
        let staged_rfp = stage(&state.rfps, rfp)?;
        let staged_market = stage(&state.markets, market)?;
        commit(&mut state.rfps, staged_rfp.clone());
        commit(&mut state.markets, staged_market.clone());
        Ok((staged_rfp, staged_market))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposals::ProposalStatus;
    use crate::test_support::*;

    async fn seeded() -> (InMemoryStore, MarketRequest) {
        let store = InMemoryStore::new();
        let market = store.save_market(&published_market(&officer())).await.unwrap();
        (store, market)
    }

    #[tokio::test]
    async fn test_stale_save_is_rejected() {
        let (store, market) = seeded().await;
        assert_eq!(market.version, 1);
        let mut first = market.clone();
        first.views_count = 1;
        store.save_market(&first).await.unwrap();

        let err = store.save_market(&market).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 1, found: 2, .. }));
    }

    #[tokio::test]
    async fn test_exclusive_insert_blocks_second_active_proposal() {
        let (store, market) = seeded().await;
        let ctx = vendor("v1");
        let p1 = Proposal::create(&ctx, &market, proposal_draft(10.0), now()).unwrap();
        let p1 = store.insert_proposal_exclusive(&p1).await.unwrap();

        let p2 = Proposal::create(&ctx, &market, proposal_draft(9.0), now()).unwrap();
        let err = store.insert_proposal_exclusive(&p2).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateActiveProposal { ref existing, .. } if *existing == p1.id.0));

        let stored_market = store.load_market(&market.id).await.unwrap().unwrap();
        assert_eq!(stored_market.proposals, vec![p1.id.clone()]);
        assert_eq!(stored_market.version, market.version + 1);
    }

    #[tokio::test]
    async fn test_withdrawn_proposal_frees_the_slot() {
        let (store, market) = seeded().await;
        let ctx = vendor("v1");
        let p1 = Proposal::create(&ctx, &market, proposal_draft(10.0), now()).unwrap();
        let mut p1 = store.insert_proposal_exclusive(&p1).await.unwrap();
        p1.status = ProposalStatus::Withdrawn;
        store.save_proposal(&p1).await.unwrap();

        let p2 = Proposal::create(&ctx, &market, proposal_draft(9.0), now()).unwrap();
        assert!(store.insert_proposal_exclusive(&p2).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_detaches_from_market() {
        let (store, market) = seeded().await;
        let p1 = Proposal::create(&vendor("v1"), &market, proposal_draft(10.0), now()).unwrap();
        let p1 = store.insert_proposal_exclusive(&p1).await.unwrap();
        store.delete_proposal(&p1.id, p1.version).await.unwrap();
        assert!(store.load_proposal(&p1.id).await.unwrap().is_none());
        assert!(store.load_market(&market.id).await.unwrap().unwrap().proposals.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let (store, _market) = seeded().await;
        store.save_contract(&active_contract()).await.unwrap();
        let snapshot = store.snapshot().await;
        let restored = InMemoryStore::from_snapshot(snapshot.clone());
        assert_eq!(restored.snapshot().await, snapshot);
    }
}
