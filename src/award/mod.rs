// Award engine
//
// Awarding resolves a market request to a single winning proposal. Every
// entity delta is computed up front into an AwardTransaction; the store then
// applies it as one all-or-nothing unit.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::AuthorizationContext;
use crate::contracts::Contract;
use crate::errors::{EntityKind, WorkflowError, WorkflowResult};
use crate::market::{MarketRequest, MarketRequestStatus};
use crate::proposals::{Proposal, ProposalStatus};
use crate::types::{ContractId, ProposalId};

/// Full set of updates produced by one award. Each entity carries the
/// version it was loaded at, so the store can detect concurrent writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardTransaction {
    pub market: MarketRequest,
    pub winner: Proposal,
    pub rejected: Vec<Proposal>,
    /// Contract created by this award, absent when one already existed
    pub new_contract: Option<Contract>,
    pub contract_id: ContractId,
}

impl AwardTransaction {
    pub fn rejected_ids(&self) -> Vec<ProposalId> {
        self.rejected.iter().map(|p| p.id.clone()).collect()
    }

    /// Winner followed by every cascaded sibling
    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        std::iter::once(&self.winner).chain(self.rejected.iter())
    }
}

/// Inputs for planning an award
pub struct AwardRequest<'a> {
    pub market: &'a MarketRequest,
    pub winner: &'a Proposal,
    /// Every proposal currently stored against the market request
    pub proposals: &'a [Proposal],
    /// Contract already recorded for the market request, if any
    pub existing_contract: Option<&'a Contract>,
    pub manager_notes: Option<String>,
    pub rejection_reason: &'a str,
}

/// Validate an award and compute its cascade without touching the inputs
pub fn plan_award(ctx: &AuthorizationContext, request: AwardRequest<'_>, now: DateTime<Utc>) -> WorkflowResult<AwardTransaction> {
    let AwardRequest {
        market,
        winner,
        proposals,
        existing_contract,
        manager_notes,
        rejection_reason,
    } = request;

    market.ensure_can_award(ctx)?;
    if market.status == MarketRequestStatus::Awarded {
        return Err(WorkflowError::AlreadyAwarded {
            market_request_id: market.id.to_string(),
        });
    }
    if !market.status.is_open() {
        return Err(WorkflowError::invalid_state(EntityKind::MarketRequest, &market.id, market.status, "award"));
    }
    if winner.market_request_id != market.id {
        return Err(WorkflowError::Validation {
            message: format!("proposal {} does not belong to market request {}", winner.id, market.id),
            fields: vec!["proposalId".to_string()],
        });
    }
    if !winner.status.is_pending_decision() {
        return Err(WorkflowError::invalid_state(EntityKind::Proposal, &winner.id, winner.status, "award"));
    }

    let mut awarded_market = market.clone();
    awarded_market.mark_awarded(&winner.id, now);

    let mut accepted = winner.clone();
    accepted.accept_award(manager_notes, now);

    let rejected: Vec<Proposal> = proposals
        .iter()
        .filter(|p| p.id != winner.id && p.market_request_id == market.id)
        .filter(|p| p.status.is_active() && p.status != ProposalStatus::Rejected)
        .map(|p| {
            let mut sibling = p.clone();
            sibling.reject_for_award(rejection_reason, now);
            sibling
        })
        .collect();

    let (new_contract, contract_id) = match existing_contract {
        Some(contract) => (None, contract.id.clone()),
        None => {
            let contract = Contract::from_award(market, winner, &ctx.principal_id, now);
            let id = contract.id.clone();
            (Some(contract), id)
        }
    };

    Ok(AwardTransaction {
        market: awarded_market,
        winner: accepted,
        rejected,
        new_contract,
        contract_id,
    })
}
