// Workflow engine facade
//
// Each public operation loads the entities it needs, applies one domain
// transition, persists the result and publishes a domain event. Guards live
// on the entities themselves; this layer only sequences store calls and
// carries spans, metrics and events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::audit::{AuditRecord, AuditRequest, AuditRunner, FindingChange, FindingUpdate};
use crate::auth::AuthorizationContext;
use crate::award::{plan_award, AwardRequest};
use crate::config::EngineConfig;
use crate::contracts::{Contract, ContractDraft, ExpiryOutcome};
use crate::errors::{EntityKind, WorkflowError, WorkflowResult};
use crate::evaluation::{rank_proposals, AiIngestOutcome, RankedProposal, Recommendation, ScoreInput, ScoringWeights};
use crate::events::{DomainEvent, EventEnvelope, EventSink, TracingEventSink};
use crate::market::{MarketRequest, MarketRequestDraft, MarketRequestStatus, MarketRequestUpdate};
use crate::observability::{EngineMetrics, OperationTimer};
use crate::proposals::{Proposal, ProposalDraft, ProposalStatus, ProposalUpdate};
use crate::rfp::{RfpDraft, RfpRequest, RfpUpdate};
use crate::stats::{ProcurementDashboard, VendorStats};
use crate::store::{
    ContractFilter, MarketRequestFilter, ProcurementStore, ProposalFilter, RfpFilter, StoreError,
};
use crate::telemetry::{create_transition_span, generate_correlation_id};
use crate::types::{ContractId, MarketRequestId, PrincipalId, ProposalId, RfpRequestId};

/// Source of the current time for every transition
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Result of a successful award
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardOutcome {
    pub market_request_id: MarketRequestId,
    pub proposal_id: ProposalId,
    pub vendor_id: PrincipalId,
    pub contract_id: ContractId,
    pub contract_created: bool,
    pub rejected_proposals: Vec<ProposalId>,
}

pub struct ProcurementEngine<S: ProcurementStore> {
    store: Arc<S>,
    config: EngineConfig,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    auditor: AuditRunner,
    metrics: Arc<EngineMetrics>,
}

impl<S: ProcurementStore> ProcurementEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        let auditor = AuditRunner::new(config.audit.penalties, config.audit.expiry_warning_days);
        Self {
            store: Arc::new(store),
            config,
            events: Arc::new(TracingEventSink),
            clock: Arc::new(SystemClock),
            auditor,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the audit runner, e.g. to register extra compliance checks
    pub fn with_auditor(mut self, auditor: AuditRunner) -> Self {
        self.auditor = auditor;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn emit(&self, ctx: &AuthorizationContext, correlation_id: &str, event: DomainEvent) {
        let envelope = EventEnvelope::new(event, Some(ctx.principal_id.clone()), correlation_id, self.now());
        self.events.publish(&envelope);
    }

    /// Run one transition inside its span, with timing, metrics and logging
    async fn transition<T, F, Fut>(
        &self,
        operation: &'static str,
        entity_id: Option<&str>,
        ctx: &AuthorizationContext,
        body: F,
    ) -> WorkflowResult<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = WorkflowResult<T>>,
    {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span(operation, entity_id, ctx, &correlation_id);
        let timer = OperationTimer::new(operation);
        let result = body(correlation_id).instrument(span.clone()).await;
        let metrics_enabled = self.config.observability.metrics_enabled;

        let _entered = span.enter();
        match &result {
            Ok(_) => {
                if metrics_enabled {
                    self.metrics.record_applied();
                }
                info!(operation, "Transition applied");
                timer.finish("applied");
            }
            Err(err) => {
                if metrics_enabled {
                    self.metrics.record_rejected();
                    if matches!(err, WorkflowError::Store(StoreError::VersionConflict { .. })) {
                        self.metrics.record_version_conflict();
                    }
                }
                warn!(operation, error_kind = err.kind(), error = %err, "Transition rejected");
                timer.finish(err.kind());
            }
        }
        result
    }

    async fn require_rfp(&self, id: &RfpRequestId) -> WorkflowResult<RfpRequest> {
        self.store
            .load_rfp(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(EntityKind::RfpRequest, id))
    }

    async fn require_market(&self, id: &MarketRequestId) -> WorkflowResult<MarketRequest> {
        self.store
            .load_market(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(EntityKind::MarketRequest, id))
    }

    async fn require_proposal(&self, id: &ProposalId) -> WorkflowResult<Proposal> {
        self.store
            .load_proposal(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(EntityKind::Proposal, id))
    }

    async fn require_contract(&self, id: &ContractId) -> WorkflowResult<Contract> {
        self.store
            .load_contract(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(EntityKind::Contract, id))
    }

    // RFP requests

    pub async fn create_rfp(&self, ctx: &AuthorizationContext, draft: RfpDraft) -> WorkflowResult<RfpRequest> {
        self.transition("rfp.create", None, ctx, |_| async move {
            let rfp = RfpRequest::create(ctx, draft, self.now())?;
            Ok(self.store.save_rfp(&rfp).await?)
        })
        .await
    }

    pub async fn get_rfp(&self, id: &RfpRequestId) -> WorkflowResult<RfpRequest> {
        self.require_rfp(id).await
    }

    pub async fn list_rfps(&self, filter: &RfpFilter) -> WorkflowResult<Vec<RfpRequest>> {
        Ok(self.store.query_rfps(filter).await?)
    }

    pub async fn update_rfp(
        &self,
        ctx: &AuthorizationContext,
        id: &RfpRequestId,
        update: RfpUpdate,
    ) -> WorkflowResult<RfpRequest> {
        self.transition("rfp.update", Some(id.as_str()), ctx, |_| async move {
            let mut rfp = self.require_rfp(id).await?;
            rfp.update(ctx, update, self.now())?;
            Ok(self.store.save_rfp(&rfp).await?)
        })
        .await
    }

    pub async fn submit_rfp(&self, ctx: &AuthorizationContext, id: &RfpRequestId) -> WorkflowResult<RfpRequest> {
        self.transition("rfp.submit", Some(id.as_str()), ctx, |cid| async move {
            let mut rfp = self.require_rfp(id).await?;
            rfp.submit_for_review(ctx, self.now())?;
            let rfp = self.store.save_rfp(&rfp).await?;
            self.emit(ctx, &cid, DomainEvent::RfpSubmitted {
                rfp_request_id: rfp.id.clone(),
            });
            Ok(rfp)
        })
        .await
    }

    pub async fn approve_rfp(
        &self,
        ctx: &AuthorizationContext,
        id: &RfpRequestId,
        notes: Option<String>,
    ) -> WorkflowResult<RfpRequest> {
        self.transition("rfp.approve", Some(id.as_str()), ctx, |cid| async move {
            let mut rfp = self.require_rfp(id).await?;
            rfp.approve(ctx, notes, self.now())?;
            let rfp = self.store.save_rfp(&rfp).await?;
            self.emit(ctx, &cid, DomainEvent::RfpReviewed {
                rfp_request_id: rfp.id.clone(),
                approved: true,
            });
            Ok(rfp)
        })
        .await
    }

    pub async fn reject_rfp(&self, ctx: &AuthorizationContext, id: &RfpRequestId, notes: &str) -> WorkflowResult<RfpRequest> {
        self.transition("rfp.reject", Some(id.as_str()), ctx, |cid| async move {
            let mut rfp = self.require_rfp(id).await?;
            rfp.reject(ctx, notes, self.now())?;
            let rfp = self.store.save_rfp(&rfp).await?;
            self.emit(ctx, &cid, DomainEvent::RfpReviewed {
                rfp_request_id: rfp.id.clone(),
                approved: false,
            });
            Ok(rfp)
        })
        .await
    }

    pub async fn delete_rfp(&self, ctx: &AuthorizationContext, id: &RfpRequestId) -> WorkflowResult<()> {
        self.transition("rfp.delete", Some(id.as_str()), ctx, |_| async move {
            let rfp = self.require_rfp(id).await?;
            rfp.ensure_deletable(ctx)?;
            Ok(self.store.delete_rfp(id, rfp.version).await?)
        })
        .await
    }

    /// Turn an approved RFP into a draft market request of the same
    /// organization. Both are written together.
    pub async fn convert_rfp(
        &self,
        ctx: &AuthorizationContext,
        id: &RfpRequestId,
    ) -> WorkflowResult<(RfpRequest, MarketRequest)> {
        self.transition("rfp.convert", Some(id.as_str()), ctx, |cid| async move {
            let mut rfp = self.require_rfp(id).await?;
            let market = rfp.convert(ctx, self.now())?;
            let (rfp, market) = self.store.apply_conversion(&rfp, &market).await?;
            self.emit(ctx, &cid, DomainEvent::RfpConverted {
                rfp_request_id: rfp.id.clone(),
                market_request_id: market.id.clone(),
            });
            Ok((rfp, market))
        })
        .await
    }

    // Market requests

    pub async fn create_market(&self, ctx: &AuthorizationContext, draft: MarketRequestDraft) -> WorkflowResult<MarketRequest> {
        self.transition("market.create", None, ctx, |_| async move {
            let market = MarketRequest::create(ctx, draft, self.now())?;
            Ok(self.store.save_market(&market).await?)
        })
        .await
    }

    pub async fn get_market(&self, id: &MarketRequestId) -> WorkflowResult<MarketRequest> {
        self.require_market(id).await
    }

    pub async fn list_markets(&self, filter: &MarketRequestFilter) -> WorkflowResult<Vec<MarketRequest>> {
        Ok(self.store.query_markets(filter).await?)
    }

    pub async fn update_market(
        &self,
        ctx: &AuthorizationContext,
        id: &MarketRequestId,
        update: MarketRequestUpdate,
    ) -> WorkflowResult<MarketRequest> {
        self.transition("market.update", Some(id.as_str()), ctx, |_| async move {
            let mut market = self.require_market(id).await?;
            market.update(ctx, update, self.now())?;
            Ok(self.store.save_market(&market).await?)
        })
        .await
    }

    pub async fn publish_market(&self, ctx: &AuthorizationContext, id: &MarketRequestId) -> WorkflowResult<MarketRequest> {
        self.transition("market.publish", Some(id.as_str()), ctx, |cid| async move {
            let mut market = self.require_market(id).await?;
            market.publish(ctx, self.now())?;
            let market = self.store.save_market(&market).await?;
            self.emit(ctx, &cid, DomainEvent::MarketRequestPublished {
                market_request_id: market.id.clone(),
            });
            Ok(market)
        })
        .await
    }

    pub async fn activate_market(&self, ctx: &AuthorizationContext, id: &MarketRequestId) -> WorkflowResult<MarketRequest> {
        self.transition("market.activate", Some(id.as_str()), ctx, |cid| async move {
            let mut market = self.require_market(id).await?;
            market.activate(ctx, self.now())?;
            let market = self.store.save_market(&market).await?;
            self.emit(ctx, &cid, DomainEvent::MarketRequestActivated {
                market_request_id: market.id.clone(),
            });
            Ok(market)
        })
        .await
    }

    pub async fn close_market(
        &self,
        ctx: &AuthorizationContext,
        id: &MarketRequestId,
        reason: &str,
    ) -> WorkflowResult<MarketRequest> {
        self.transition("market.close", Some(id.as_str()), ctx, |cid| async move {
            let mut market = self.require_market(id).await?;
            market.close(ctx, reason, self.now())?;
            let market = self.store.save_market(&market).await?;
            self.emit(ctx, &cid, DomainEvent::MarketRequestClosed {
                market_request_id: market.id.clone(),
                reason: reason.to_string(),
            });
            Ok(market)
        })
        .await
    }

    pub async fn cancel_market(
        &self,
        ctx: &AuthorizationContext,
        id: &MarketRequestId,
        reason: &str,
    ) -> WorkflowResult<MarketRequest> {
        self.transition("market.cancel", Some(id.as_str()), ctx, |cid| async move {
            let mut market = self.require_market(id).await?;
            market.cancel(ctx, reason, self.now())?;
            let market = self.store.save_market(&market).await?;
            self.emit(ctx, &cid, DomainEvent::MarketRequestCancelled {
                market_request_id: market.id.clone(),
                reason: reason.to_string(),
            });
            Ok(market)
        })
        .await
    }

    pub async fn delete_market(&self, ctx: &AuthorizationContext, id: &MarketRequestId) -> WorkflowResult<()> {
        self.transition("market.delete", Some(id.as_str()), ctx, |_| async move {
            let market = self.require_market(id).await?;
            market.ensure_deletable(ctx)?;
            Ok(self.store.delete_market(id, market.version).await?)
        })
        .await
    }

    pub async fn record_market_view(&self, id: &MarketRequestId) -> WorkflowResult<MarketRequest> {
        let mut market = self.require_market(id).await?;
        market.record_view();
        Ok(self.store.save_market(&market).await?)
    }

    /// Resolve a market request to one winning proposal. Siblings are
    /// rejected and the contract created in the same store transaction.
    pub async fn award(
        &self,
        ctx: &AuthorizationContext,
        market_id: &MarketRequestId,
        proposal_id: &ProposalId,
        manager_notes: Option<String>,
    ) -> WorkflowResult<AwardOutcome> {
        self.transition("market.award", Some(market_id.as_str()), ctx, |cid| async move {
            let market = self.require_market(market_id).await?;
            let winner = self.require_proposal(proposal_id).await?;
            let proposals = self.store.query_proposals(&ProposalFilter::for_market(market_id)).await?;
            let existing_contract = self
                .store
                .query_contracts(&ContractFilter::for_market(market_id))
                .await?
                .into_iter()
                .next();

            let tx = plan_award(
                ctx,
                AwardRequest {
                    market: &market,
                    winner: &winner,
                    proposals: &proposals,
                    existing_contract: existing_contract.as_ref(),
                    manager_notes,
                    rejection_reason: &self.config.workflow.award_rejection_reason,
                },
                self.now(),
            )?;

            if let Err(err) = self.store.apply_award(&tx).await {
                if matches!(err, StoreError::VersionConflict { .. }) {
                    let current = self.store.load_market(market_id).await?;
                    if current.is_some_and(|m| m.status == MarketRequestStatus::Awarded) {
                        return Err(WorkflowError::AlreadyAwarded {
                            market_request_id: market_id.to_string(),
                        });
                    }
                }
                return Err(err.into());
            }

            if self.config.observability.metrics_enabled {
                self.metrics.record_award();
            }
            let outcome = AwardOutcome {
                market_request_id: tx.market.id.clone(),
                proposal_id: tx.winner.id.clone(),
                vendor_id: tx.winner.vendor_id.clone(),
                contract_id: tx.contract_id.clone(),
                contract_created: tx.new_contract.is_some(),
                rejected_proposals: tx.rejected_ids(),
            };
            info!(
                market_request_id = %outcome.market_request_id,
                proposal_id = %outcome.proposal_id,
                rejected = outcome.rejected_proposals.len(),
                "Market request awarded"
            );
            self.emit(ctx, &cid, DomainEvent::ProposalAwarded {
                market_request_id: outcome.market_request_id.clone(),
                proposal_id: outcome.proposal_id.clone(),
                vendor_id: outcome.vendor_id.clone(),
                contract_id: outcome.contract_id.clone(),
                rejected_proposals: outcome.rejected_proposals.clone(),
            });
            Ok(outcome)
        })
        .await
    }

    // Proposals

    /// Open a draft proposal. The one-active-proposal check and the insert
    /// are a single store operation.
    pub async fn create_proposal(
        &self,
        ctx: &AuthorizationContext,
        market_id: &MarketRequestId,
        draft: ProposalDraft,
    ) -> WorkflowResult<Proposal> {
        self.transition("proposal.create", Some(market_id.as_str()), ctx, |_| async move {
            let market = self.require_market(market_id).await?;
            let proposal = Proposal::create(ctx, &market, draft, self.now())?;
            Ok(self.store.insert_proposal_exclusive(&proposal).await?)
        })
        .await
    }

    pub async fn get_proposal(&self, id: &ProposalId) -> WorkflowResult<Proposal> {
        self.require_proposal(id).await
    }

    pub async fn list_proposals(&self, filter: &ProposalFilter) -> WorkflowResult<Vec<Proposal>> {
        Ok(self.store.query_proposals(filter).await?)
    }

    pub async fn update_proposal(
        &self,
        ctx: &AuthorizationContext,
        id: &ProposalId,
        update: ProposalUpdate,
    ) -> WorkflowResult<Proposal> {
        self.transition("proposal.update", Some(id.as_str()), ctx, |_| async move {
            let mut proposal = self.require_proposal(id).await?;
            proposal.update(ctx, update, self.now())?;
            Ok(self.store.save_proposal(&proposal).await?)
        })
        .await
    }

    pub async fn submit_proposal(&self, ctx: &AuthorizationContext, id: &ProposalId) -> WorkflowResult<Proposal> {
        self.transition("proposal.submit", Some(id.as_str()), ctx, |cid| async move {
            let mut proposal = self.require_proposal(id).await?;
            let market = self.require_market(&proposal.market_request_id).await?;
            let siblings = self
                .store
                .query_proposals(&ProposalFilter::for_market(&market.id))
                .await?;
            proposal.submit(ctx, &market, siblings.iter(), self.now())?;
            let proposal = self.store.save_proposal(&proposal).await?;
            self.emit(ctx, &cid, DomainEvent::ProposalSubmitted {
                proposal_id: proposal.id.clone(),
                market_request_id: proposal.market_request_id.clone(),
                vendor_id: proposal.vendor_id.clone(),
            });
            Ok(proposal)
        })
        .await
    }

    pub async fn withdraw_proposal(&self, ctx: &AuthorizationContext, id: &ProposalId) -> WorkflowResult<Proposal> {
        self.transition("proposal.withdraw", Some(id.as_str()), ctx, |cid| async move {
            let mut proposal = self.require_proposal(id).await?;
            proposal.withdraw(ctx, self.now())?;
            let proposal = self.store.save_proposal(&proposal).await?;
            self.emit(ctx, &cid, DomainEvent::ProposalWithdrawn {
                proposal_id: proposal.id.clone(),
                market_request_id: proposal.market_request_id.clone(),
            });
            Ok(proposal)
        })
        .await
    }

    pub async fn evaluate_proposal(
        &self,
        ctx: &AuthorizationContext,
        id: &ProposalId,
        scores: ScoreInput,
        notes: Option<String>,
        recommendation: Option<Recommendation>,
        weights: Option<ScoringWeights>,
    ) -> WorkflowResult<Proposal> {
        self.transition("proposal.evaluate", Some(id.as_str()), ctx, |cid| async move {
            let mut proposal = self.require_proposal(id).await?;
            let market = self.require_market(&proposal.market_request_id).await?;
            proposal.evaluate(
                ctx,
                &market,
                scores,
                notes,
                recommendation,
                weights,
                &self.config.workflow.scoring_weights,
                self.now(),
            )?;
            let proposal = self.store.save_proposal(&proposal).await?;
            let overall_score = proposal.evaluation_scores.map(|s| s.overall).unwrap_or_default();
            self.emit(ctx, &cid, DomainEvent::ProposalEvaluated {
                proposal_id: proposal.id.clone(),
                overall_score,
            });
            Ok(proposal)
        })
        .await
    }

    pub async fn reject_proposal(
        &self,
        ctx: &AuthorizationContext,
        id: &ProposalId,
        reason: &str,
    ) -> WorkflowResult<Proposal> {
        self.transition("proposal.reject", Some(id.as_str()), ctx, |cid| async move {
            let mut proposal = self.require_proposal(id).await?;
            let market = self.require_market(&proposal.market_request_id).await?;
            proposal.reject(ctx, &market, reason, self.now())?;
            let proposal = self.store.save_proposal(&proposal).await?;
            self.emit(ctx, &cid, DomainEvent::ProposalRejected {
                proposal_id: proposal.id.clone(),
                reason: reason.trim().to_string(),
            });
            Ok(proposal)
        })
        .await
    }

    /// Hand over the external scorer's output. Malformed payloads are
    /// reported in the outcome and leave the proposal untouched.
    pub async fn attach_ai_evaluation(
        &self,
        ctx: &AuthorizationContext,
        id: &ProposalId,
        payload: &serde_json::Value,
    ) -> WorkflowResult<AiIngestOutcome> {
        self.transition("proposal.ai_evaluation", Some(id.as_str()), ctx, |_| async move {
            let mut proposal = self.require_proposal(id).await?;
            let market = self.require_market(&proposal.market_request_id).await?;
            let outcome = proposal.attach_ai_evaluation(ctx, &market, payload, self.now())?;
            match &outcome {
                AiIngestOutcome::Stored => {
                    self.store.save_proposal(&proposal).await?;
                }
                AiIngestOutcome::Discarded { reason } => {
                    if self.config.observability.metrics_enabled {
                        self.metrics.record_ai_discarded();
                    }
                    warn!(proposal_id = %proposal.id, reason = %reason, "Discarded malformed AI evaluation");
                }
            }
            Ok(outcome)
        })
        .await
    }

    pub async fn delete_proposal(&self, ctx: &AuthorizationContext, id: &ProposalId) -> WorkflowResult<()> {
        self.transition("proposal.delete", Some(id.as_str()), ctx, |_| async move {
            let proposal = self.require_proposal(id).await?;
            proposal.ensure_deletable(ctx)?;
            Ok(self.store.delete_proposal(id, proposal.version).await?)
        })
        .await
    }

    /// Comparison view of a market request's submitted proposals, best first
    pub async fn compare_proposals(
        &self,
        ctx: &AuthorizationContext,
        market_id: &MarketRequestId,
    ) -> WorkflowResult<Vec<RankedProposal>> {
        let market = self.require_market(market_id).await?;
        ctx.require_reviewer("compare proposals", &market.organization_id)?;
        let proposals: Vec<Proposal> = self
            .store
            .query_proposals(&ProposalFilter::for_market(market_id))
            .await?
            .into_iter()
            .filter(|p| p.status.is_submitted_or_later() && p.status != ProposalStatus::Withdrawn)
            .collect();
        Ok(rank_proposals(&proposals))
    }

    // Contracts

    pub async fn create_contract(&self, ctx: &AuthorizationContext, draft: ContractDraft) -> WorkflowResult<Contract> {
        self.transition("contract.create", None, ctx, |_| async move {
            let contract = Contract::create(ctx, draft, self.now())?;
            Ok(self.store.save_contract(&contract).await?)
        })
        .await
    }

    pub async fn get_contract(&self, id: &ContractId) -> WorkflowResult<Contract> {
        self.require_contract(id).await
    }

    pub async fn list_contracts(&self, filter: &ContractFilter) -> WorkflowResult<Vec<Contract>> {
        Ok(self.store.query_contracts(filter).await?)
    }

    async fn save_status_change(
        &self,
        ctx: &AuthorizationContext,
        correlation_id: &str,
        contract: &Contract,
    ) -> WorkflowResult<Contract> {
        let contract = self.store.save_contract(contract).await?;
        self.emit(ctx, correlation_id, DomainEvent::ContractStatusChanged {
            contract_id: contract.id.clone(),
            status: contract.status,
        });
        Ok(contract)
    }

    pub async fn submit_contract(&self, ctx: &AuthorizationContext, id: &ContractId) -> WorkflowResult<Contract> {
        self.transition("contract.submit", Some(id.as_str()), ctx, |cid| async move {
            let mut contract = self.require_contract(id).await?;
            contract.submit(ctx, self.now())?;
            self.save_status_change(ctx, &cid, &contract).await
        })
        .await
    }

    pub async fn activate_contract(
        &self,
        ctx: &AuthorizationContext,
        id: &ContractId,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> WorkflowResult<Contract> {
        self.transition("contract.activate", Some(id.as_str()), ctx, |cid| async move {
            let mut contract = self.require_contract(id).await?;
            contract.activate(ctx, start_date, end_date, self.now())?;
            self.save_status_change(ctx, &cid, &contract).await
        })
        .await
    }

    pub async fn complete_contract(&self, ctx: &AuthorizationContext, id: &ContractId) -> WorkflowResult<Contract> {
        self.transition("contract.complete", Some(id.as_str()), ctx, |cid| async move {
            let mut contract = self.require_contract(id).await?;
            contract.complete(ctx, self.now())?;
            self.save_status_change(ctx, &cid, &contract).await
        })
        .await
    }

    pub async fn terminate_contract(
        &self,
        ctx: &AuthorizationContext,
        id: &ContractId,
        reason: &str,
    ) -> WorkflowResult<Contract> {
        self.transition("contract.terminate", Some(id.as_str()), ctx, |cid| async move {
            let mut contract = self.require_contract(id).await?;
            contract.terminate(ctx, reason, self.now())?;
            self.save_status_change(ctx, &cid, &contract).await
        })
        .await
    }

    /// Expire or auto-renew an active contract whose end date has passed
    pub async fn refresh_contract_expiry(
        &self,
        ctx: &AuthorizationContext,
        id: &ContractId,
    ) -> WorkflowResult<(Contract, ExpiryOutcome)> {
        self.transition("contract.refresh_expiry", Some(id.as_str()), ctx, |cid| async move {
            let mut contract = self.require_contract(id).await?;
            contract.require_staff(ctx, "refresh contract expiry")?;
            let outcome = contract.refresh_expiry(self.now());
            let contract = match outcome {
                ExpiryOutcome::Unchanged => contract,
                ExpiryOutcome::Expired => self.save_status_change(ctx, &cid, &contract).await?,
                ExpiryOutcome::Renewed { new_end_date } => {
                    let contract = self.store.save_contract(&contract).await?;
                    self.emit(ctx, &cid, DomainEvent::ContractRenewed {
                        contract_id: contract.id.clone(),
                        new_end_date,
                    });
                    contract
                }
            };
            Ok((contract, outcome))
        })
        .await
    }

    // Audits

    /// Run the compliance checks, merge the auditor's findings and append
    /// the resulting record to the contract
    pub async fn run_audit(
        &self,
        ctx: &AuthorizationContext,
        id: &ContractId,
        request: AuditRequest,
    ) -> WorkflowResult<AuditRecord> {
        self.transition("audit.run", Some(id.as_str()), ctx, |cid| async move {
            let mut contract = self.require_contract(id).await?;
            let audit_index = self.auditor.run(ctx, &mut contract, request, self.now())?;
            let contract = self.store.save_contract(&contract).await?;
            let record = contract
                .audits
                .get(audit_index)
                .cloned()
                .ok_or_else(|| WorkflowError::not_found(EntityKind::AuditRecord, format!("{id}/audits/{audit_index}")))?;

            if self.config.observability.metrics_enabled {
                self.metrics.record_audit();
            }
            self.emit(ctx, &cid, DomainEvent::AuditCompleted {
                contract_id: contract.id.clone(),
                audit_index,
                compliance_score: record.compliance_score,
                risk_level: record.risk_level,
            });
            Ok(record)
        })
        .await
    }

    pub async fn update_finding(
        &self,
        ctx: &AuthorizationContext,
        id: &ContractId,
        audit_index: usize,
        finding_index: usize,
        update: FindingUpdate,
    ) -> WorkflowResult<FindingChange> {
        self.transition("audit.update_finding", Some(id.as_str()), ctx, |cid| async move {
            let mut contract = self.require_contract(id).await?;
            let change = contract.update_finding(ctx, audit_index, finding_index, update, self.now())?;
            let contract = self.store.save_contract(&contract).await?;

            if change.resolved() {
                if self.config.observability.metrics_enabled {
                    self.metrics.record_finding_resolved();
                }
                self.emit(ctx, &cid, DomainEvent::AuditFindingResolved {
                    contract_id: contract.id.clone(),
                    audit_index,
                    finding_index,
                    severity: change.severity,
                });
            }
            Ok(change)
        })
        .await
    }

    // Statistics

    /// Dashboard over the caller's organization; admins see everything
    pub async fn dashboard(&self, ctx: &AuthorizationContext) -> WorkflowResult<ProcurementDashboard> {
        ctx.require_staff("view procurement statistics")?;
        let organization_id = (!ctx.is_admin()).then(|| ctx.organization_id.clone());

        let rfps = self
            .store
            .query_rfps(&RfpFilter {
                organization_id: organization_id.clone(),
                ..Default::default()
            })
            .await?;
        let markets = self
            .store
            .query_markets(&MarketRequestFilter {
                organization_id: organization_id.clone(),
                ..Default::default()
            })
            .await?;
        let market_ids: HashSet<&MarketRequestId> = markets.iter().map(|m| &m.id).collect();
        let proposals: Vec<Proposal> = self
            .store
            .query_proposals(&ProposalFilter::default())
            .await?
            .into_iter()
            .filter(|p| market_ids.contains(&p.market_request_id))
            .collect();
        let contracts = self
            .store
            .query_contracts(&ContractFilter {
                organization_id,
                ..Default::default()
            })
            .await?;

        Ok(ProcurementDashboard::compute(
            &rfps,
            &markets,
            &proposals,
            &contracts,
            self.now(),
            self.config.audit.expiry_warning_days,
        ))
    }

    /// Vendors see only their own numbers; staff may look up anyone
    pub async fn vendor_stats(&self, ctx: &AuthorizationContext, vendor_id: &PrincipalId) -> WorkflowResult<VendorStats> {
        if !ctx.role.is_staff() && !ctx.is(vendor_id) {
            return Err(ctx.denied("view another vendor's statistics"));
        }
        let proposals = self.store.query_proposals(&ProposalFilter::for_vendor(vendor_id)).await?;
        Ok(VendorStats::for_vendor(vendor_id, &proposals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::FindingStatus;
    use crate::events::{MockEventSink, RecordingEventSink};
    use crate::store::InMemoryStore;
    use crate::test_support::*;
    use crate::types::Severity;

    fn engine() -> (ProcurementEngine<InMemoryStore>, Arc<RecordingEventSink>) {
        let sink = Arc::new(RecordingEventSink::new());
        let engine = ProcurementEngine::new(InMemoryStore::new(), EngineConfig::default())
            .with_event_sink(sink.clone())
            .with_clock(Arc::new(FixedClock(now())));
        (engine, sink)
    }

    async fn open_market(engine: &ProcurementEngine<InMemoryStore>) -> MarketRequest {
        let draft = market_draft(Some(now() + chrono::Duration::days(7)));
        let market = engine.create_market(&officer(), draft).await.unwrap();
        engine.publish_market(&officer(), &market.id).await.unwrap()
    }

    async fn submitted(engine: &ProcurementEngine<InMemoryStore>, market: &MarketRequest, vendor_id: &str, price: f64) -> Proposal {
        let ctx = vendor(vendor_id);
        let draft = engine.create_proposal(&ctx, &market.id, proposal_draft(price)).await.unwrap();
        engine.submit_proposal(&ctx, &draft.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_award_publishes_single_event_and_counts() {
        let mut sink = MockEventSink::new();
        sink.expect_publish()
            .withf(|e| e.event.name() == "ProposalAwarded" && e.correlation_id.len() == 36)
            .times(1)
            .return_const(());
        sink.expect_publish()
            .withf(|e| e.event.name() != "ProposalAwarded")
            .return_const(());

        let mut clock = MockClock::new();
        clock.expect_now().return_const(now());

        let engine = ProcurementEngine::new(InMemoryStore::new(), EngineConfig::default())
            .with_event_sink(Arc::new(sink))
            .with_clock(Arc::new(clock));
        let market = open_market(&engine).await;
        let winner = submitted(&engine, &market, "v1", 900.0).await;
        let loser = submitted(&engine, &market, "v2", 800.0).await;

        let outcome = engine.award(&manager(), &market.id, &winner.id, None).await.unwrap();
        assert!(outcome.contract_created);
        assert_eq!(outcome.rejected_proposals, vec![loser.id.clone()]);
        assert_eq!(engine.metrics().get_stats().awards, 1);

        let again = engine.award(&manager(), &market.id, &winner.id, None).await.unwrap_err();
        assert!(matches!(again, WorkflowError::AlreadyAwarded { .. }));
        assert_eq!(engine.list_contracts(&ContractFilter::for_market(&market.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_transition_is_counted_and_silent() {
        let (engine, sink) = engine();
        let market = open_market(&engine).await;
        sink.drain();

        let err = engine.close_market(&vendor("v1"), &market.id, "done").await.unwrap_err();
        assert_eq!(err.kind(), "authorization_error");
        assert!(sink.events().is_empty());
        assert_eq!(engine.metrics().get_stats().transitions_rejected, 1);
    }

    #[tokio::test]
    async fn test_missing_entity_is_not_found() {
        let (engine, _) = engine();
        let err = engine.submit_rfp(&officer(), &"nope".into()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { entity: EntityKind::RfpRequest, .. }));
    }

    #[tokio::test]
    async fn test_duplicate_draft_is_refused() {
        let (engine, _) = engine();
        let market = open_market(&engine).await;
        engine.create_proposal(&vendor("v1"), &market.id, proposal_draft(5.0)).await.unwrap();
        let err = engine
            .create_proposal(&vendor("v1"), &market.id, proposal_draft(4.0))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateProposal { .. }));
    }

    #[tokio::test]
    async fn test_malformed_ai_payload_is_discarded() {
        let (engine, _) = engine();
        let market = open_market(&engine).await;
        let proposal = submitted(&engine, &market, "v1", 10.0).await;

        let outcome = engine
            .attach_ai_evaluation(&officer(), &proposal.id, &serde_json::json!({ "confidenceScore": "high" }))
            .await
            .unwrap();
        assert!(matches!(outcome, AiIngestOutcome::Discarded { .. }));
        assert!(engine.get_proposal(&proposal.id).await.unwrap().ai_evaluation.is_none());
        assert_eq!(engine.metrics().get_stats().ai_evaluations_discarded, 1);
    }

    #[tokio::test]
    async fn test_resolving_a_finding_emits_event() {
        let (engine, sink) = engine();
        let contract = engine.create_contract(&officer(), contract_draft()).await.unwrap();
        engine.submit_contract(&officer(), &contract.id).await.unwrap();
        engine.activate_contract(&officer(), &contract.id, None, None).await.unwrap();

        let request = AuditRequest {
            findings: vec![crate::audit::NewFinding {
                title: "Missing insurance certificate".to_string(),
                description: "Certificate expired".to_string(),
                severity: Severity::High,
                recommendation: None,
                assigned_to: None,
            }],
            ..Default::default()
        };
        let record = engine.run_audit(&manager(), &contract.id, request).await.unwrap();
        assert_eq!(record.risk_level, Severity::High);

        let index = record.findings.len() - 1;
        let update = FindingUpdate {
            status: Some(FindingStatus::Resolved),
            resolution: Some("Certificate renewed".to_string()),
            assigned_to: None,
        };
        let change = engine.update_finding(&officer(), &contract.id, 0, index, update).await.unwrap();
        assert!(change.resolved());
        assert_eq!(sink.names().last(), Some(&"AuditFindingResolved"));

        let stored = engine.get_contract(&contract.id).await.unwrap();
        assert_eq!(stored.audits[0].risk_level, Severity::High);
    }

    #[tokio::test]
    async fn test_vendor_cannot_read_other_vendor_stats() {
        let (engine, _) = engine();
        let err = engine.vendor_stats(&vendor("v1"), &"v2".into()).await.unwrap_err();
        assert_eq!(err.kind(), "authorization_error");
        assert!(engine.vendor_stats(&manager(), &"v2".into()).await.is_ok());
    }
}
