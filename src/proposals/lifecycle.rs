// Transition guards for proposals

use chrono::{DateTime, Utc};

use super::types::{Proposal, ProposalDraft, ProposalStatus, ProposalUpdate};
use crate::auth::{AuthorizationContext, Role};
use crate::errors::{EntityKind, WorkflowError, WorkflowResult};
use crate::evaluation::{AiEvaluation, AiIngestOutcome, EvaluationScores, Recommendation, ScoreInput, ScoringWeights};
use crate::market::{MarketRequest, MarketRequestStatus};
use crate::types::{is_currency_code, is_present, MarketRequestId, PrincipalId, ProposalId};

fn validate_price(price: f64, currency: &str) -> WorkflowResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(WorkflowError::Validation {
            message: format!("total price must be a non-negative amount, got {price}"),
            fields: vec!["totalPrice".to_string()],
        });
    }
    if !is_currency_code(currency) {
        return Err(WorkflowError::Validation {
            message: format!("currency '{currency}' is not a three-letter code"),
            fields: vec!["currency".to_string()],
        });
    }
    Ok(())
}

/// Fail with `DuplicateProposal` when `vendor` already holds a non-withdrawn
/// proposal for `market` among `existing`, ignoring `exclude`.
pub fn ensure_no_active_duplicate<'a>(
    vendor: &PrincipalId,
    market: &MarketRequestId,
    existing: impl IntoIterator<Item = &'a Proposal>,
    exclude: Option<&ProposalId>,
) -> WorkflowResult<()> {
    let clash = existing.into_iter().find(|p| {
        &p.vendor_id == vendor
            && &p.market_request_id == market
            && p.status.is_active()
            && Some(&p.id) != exclude
    });
    match clash {
        Some(existing) => Err(WorkflowError::DuplicateProposal {
            vendor_id: vendor.to_string(),
            market_request_id: market.to_string(),
            existing: existing.id.to_string(),
        }),
        None => Ok(()),
    }
}

impl Proposal {
    /// Start a draft against an open market request. Only vendors respond.
    pub fn create(
        ctx: &AuthorizationContext,
        market: &MarketRequest,
        draft: ProposalDraft,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Self> {
        if ctx.role != Role::Vendor {
            return Err(ctx.denied("create proposals"));
        }
        market.ensure_accepting_proposals(now)?;
        validate_price(draft.total_price, &draft.currency)?;

        Ok(Self {
            id: ProposalId::generate(),
            market_request_id: market.id.clone(),
            vendor_id: ctx.principal_id.clone(),
            vendor_organization_id: ctx.organization_id.clone(),
            proposed_item: draft.proposed_item,
            description: draft.description,
            total_price: draft.total_price,
            currency: draft.currency,
            delivery_time_days: draft.delivery_time_days,
            technical_proposal: draft.technical_proposal,
            commercial_proposal: draft.commercial_proposal,
            compliance_matrix: draft.compliance_matrix,
            status: ProposalStatus::Draft,
            submitted_at: None,
            evaluation_scores: None,
            evaluation_notes: None,
            recommendation: None,
            evaluated_by: None,
            evaluated_at: None,
            ai_evaluation: None,
            rejection_reason: None,
            manager_notes: None,
            decided_at: None,
            withdrawn_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    fn require_vendor_owner(&self, ctx: &AuthorizationContext, action: &str) -> WorkflowResult<()> {
        if ctx.role == Role::Vendor && ctx.is(&self.vendor_id) {
            Ok(())
        } else {
            Err(ctx.denied(action))
        }
    }

    fn invalid(&self, attempted: &str) -> WorkflowError {
        WorkflowError::invalid_state(EntityKind::Proposal, &self.id, self.status, attempted)
    }

    fn ensure_belongs_to(&self, market: &MarketRequest) -> WorkflowResult<()> {
        if self.market_request_id != market.id {
            return Err(WorkflowError::validation(format!(
                "proposal {} does not belong to market request {}",
                self.id, market.id
            )));
        }
        Ok(())
    }

    pub fn update(&mut self, ctx: &AuthorizationContext, update: ProposalUpdate, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_vendor_owner(ctx, "edit this proposal")?;
        if self.status != ProposalStatus::Draft {
            return Err(self.invalid("edit"));
        }

        let price = update.total_price.unwrap_or(self.total_price);
        let currency = update.currency.clone().unwrap_or_else(|| self.currency.clone());
        validate_price(price, &currency)?;

        if let Some(item) = update.proposed_item {
            self.proposed_item = item;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if update.delivery_time_days.is_some() {
            self.delivery_time_days = update.delivery_time_days;
        }
        if update.technical_proposal.is_some() {
            self.technical_proposal = update.technical_proposal;
        }
        if update.commercial_proposal.is_some() {
            self.commercial_proposal = update.commercial_proposal;
        }
        if let Some(matrix) = update.compliance_matrix {
            self.compliance_matrix = matrix;
        }
        self.total_price = price;
        self.currency = currency;
        self.updated_at = now;
        Ok(())
    }

    /// Hand the draft to the buying organization. `siblings` are the other
    /// proposals currently stored for the market request; the store repeats
    /// the duplicate check atomically when the result is written.
    pub fn submit<'a>(
        &mut self,
        ctx: &AuthorizationContext,
        market: &MarketRequest,
        siblings: impl IntoIterator<Item = &'a Proposal>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        self.require_vendor_owner(ctx, "submit this proposal")?;
        self.ensure_belongs_to(market)?;
        if self.status != ProposalStatus::Draft {
            return Err(self.invalid("submit"));
        }
        market.ensure_accepting_proposals(now)?;

        let mut missing = Vec::new();
        if !is_present(&self.description) {
            missing.push("description");
        }
        if self.total_price <= 0.0 {
            missing.push("totalPrice");
        }
        if !missing.is_empty() {
            return Err(WorkflowError::missing_fields(missing));
        }
        ensure_no_active_duplicate(&self.vendor_id, &self.market_request_id, siblings, Some(&self.id))?;

        self.status = ProposalStatus::Submitted;
        self.submitted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Vendor pulls the proposal back. Irreversible.
    pub fn withdraw(&mut self, ctx: &AuthorizationContext, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_vendor_owner(ctx, "withdraw this proposal")?;
        if !self.status.is_pending_decision() {
            return Err(self.invalid("withdraw"));
        }
        self.status = ProposalStatus::Withdrawn;
        self.withdrawn_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Record reviewer scores and move the proposal under review. Weights
    /// fall back from the caller to the market request's criteria to
    /// `default_weights`.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &mut self,
        ctx: &AuthorizationContext,
        market: &MarketRequest,
        scores: ScoreInput,
        notes: Option<String>,
        recommendation: Option<Recommendation>,
        weights: Option<ScoringWeights>,
        default_weights: &ScoringWeights,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        ctx.require_reviewer("evaluate proposals", &market.organization_id)?;
        self.ensure_belongs_to(market)?;
        if self.status != ProposalStatus::Submitted {
            return Err(self.invalid("evaluate"));
        }

        let weights = weights.or(market.evaluation_criteria).unwrap_or(*default_weights);
        let scores = EvaluationScores::from_input(scores, &weights)?;

        self.evaluation_scores = Some(scores);
        self.evaluation_notes = notes;
        self.recommendation = recommendation;
        self.evaluated_by = Some(ctx.principal_id.clone());
        self.evaluated_at = Some(now);
        self.status = ProposalStatus::UnderReview;
        self.updated_at = now;
        Ok(())
    }

    /// Direct rejection by a reviewer, only before the market is awarded
    pub fn reject(
        &mut self,
        ctx: &AuthorizationContext,
        market: &MarketRequest,
        reason: &str,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        ctx.require_reviewer("reject proposals", &market.organization_id)?;
        self.ensure_belongs_to(market)?;
        if market.status == MarketRequestStatus::Awarded {
            return Err(WorkflowError::invalid_state(
                EntityKind::MarketRequest,
                &market.id,
                market.status,
                "reject proposals of",
            ));
        }
        if !self.status.is_pending_decision() {
            return Err(self.invalid("reject"));
        }
        if !is_present(reason) {
            return Err(WorkflowError::missing_fields(vec!["rejectionReason"]));
        }
        self.status = ProposalStatus::Rejected;
        self.rejection_reason = Some(reason.trim().to_string());
        self.decided_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Store the external scorer's output. Malformed payloads are discarded
    /// and reported in the outcome; the proposal stays usable either way.
    pub fn attach_ai_evaluation(
        &mut self,
        ctx: &AuthorizationContext,
        market: &MarketRequest,
        payload: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> WorkflowResult<AiIngestOutcome> {
        ctx.require_reviewer("attach AI evaluations", &market.organization_id)?;
        self.ensure_belongs_to(market)?;
        if !self.status.is_submitted_or_later() {
            return Err(self.invalid("attach an AI evaluation to"));
        }

        match AiEvaluation::parse(payload) {
            Ok(evaluation) => {
                self.ai_evaluation = Some(evaluation);
                self.updated_at = now;
                Ok(AiIngestOutcome::Stored)
            }
            Err(e) => Ok(AiIngestOutcome::Discarded { reason: e.to_string() }),
        }
    }

    /// Only the vendor's own drafts may be hard-deleted
    pub fn ensure_deletable(&self, ctx: &AuthorizationContext) -> WorkflowResult<()> {
        self.require_vendor_owner(ctx, "delete this proposal")?;
        if self.status != ProposalStatus::Draft {
            return Err(self.invalid("delete"));
        }
        Ok(())
    }

    pub(crate) fn accept_award(&mut self, manager_notes: Option<String>, now: DateTime<Utc>) {
        self.status = ProposalStatus::Accepted;
        self.manager_notes = manager_notes;
        self.decided_at = Some(now);
        self.updated_at = now;
    }

    pub(crate) fn reject_for_award(&mut self, reason: &str, now: DateTime<Utc>) {
        self.status = ProposalStatus::Rejected;
        self.rejection_reason = Some(reason.to_string());
        self.decided_at = Some(now);
        self.updated_at = now;
    }
}
