// Transition guards for market requests. Each operation checks the caller,
// then the current state, then the input, and only mutates on success.

use chrono::{DateTime, Utc};

use super::types::{MarketRequest, MarketRequestDraft, MarketRequestStatus, MarketRequestUpdate};
use crate::auth::{AuthorizationContext, Role};
use crate::errors::{EntityKind, WorkflowError, WorkflowResult};
use crate::types::{is_currency_code, is_present, MarketRequestId, ProposalId};

fn validate_commercials(budget: Option<f64>, currency: &str) -> WorkflowResult<()> {
    if let Some(budget) = budget {
        if !budget.is_finite() || budget < 0.0 {
            return Err(WorkflowError::Validation {
                message: format!("budget must be a non-negative amount, got {budget}"),
                fields: vec!["budget".to_string()],
            });
        }
    }
    if !is_currency_code(currency) {
        return Err(WorkflowError::Validation {
            message: format!("currency '{currency}' is not a three-letter code"),
            fields: vec!["currency".to_string()],
        });
    }
    Ok(())
}

impl MarketRequest {
    /// Create a draft market request from scratch
    pub fn create(ctx: &AuthorizationContext, draft: MarketRequestDraft, now: DateTime<Utc>) -> WorkflowResult<Self> {
        ctx.require_staff("create market requests")?;
        if !is_present(&draft.title) {
            return Err(WorkflowError::missing_fields(vec!["title"]));
        }
        validate_commercials(draft.budget, &draft.currency)?;
        if let Some(weights) = &draft.evaluation_criteria {
            weights.validate()?;
        }

        Ok(Self {
            id: MarketRequestId::generate(),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            budget: draft.budget,
            currency: draft.currency,
            deadline: draft.deadline,
            quantity: draft.quantity,
            specifications: draft.specifications,
            evaluation_criteria: draft.evaluation_criteria,
            requirements: draft.requirements,
            status: MarketRequestStatus::Draft,
            created_by: ctx.principal_id.clone(),
            organization_id: ctx.organization_id.clone(),
            source_rfp_request_id: None,
            proposals: Vec::new(),
            views_count: 0,
            close_reason: None,
            cancellation_reason: None,
            awarded_proposal_id: None,
            published_at: None,
            closed_at: None,
            awarded_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    fn require_owner(&self, ctx: &AuthorizationContext, action: &str) -> WorkflowResult<()> {
        ctx.require_owner_or_admin(action, &self.created_by)
    }

    fn invalid(&self, attempted: &str) -> WorkflowError {
        WorkflowError::invalid_state(EntityKind::MarketRequest, &self.id, self.status, attempted)
    }

    /// Edit a draft. Published requests are immutable apart from status.
    pub fn update(&mut self, ctx: &AuthorizationContext, update: MarketRequestUpdate, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_owner(ctx, "edit market requests")?;
        if self.status != MarketRequestStatus::Draft {
            return Err(self.invalid("edit"));
        }

        let budget = update.budget.or(self.budget);
        let currency = update.currency.clone().unwrap_or_else(|| self.currency.clone());
        validate_commercials(budget, &currency)?;
        if let Some(weights) = &update.evaluation_criteria {
            weights.validate()?;
        }
        if let Some(title) = &update.title {
            if !is_present(title) {
                return Err(WorkflowError::missing_fields(vec!["title"]));
            }
        }

        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if update.deadline.is_some() {
            self.deadline = update.deadline;
        }
        if update.quantity.is_some() {
            self.quantity = update.quantity;
        }
        if update.specifications.is_some() {
            self.specifications = update.specifications;
        }
        if update.evaluation_criteria.is_some() {
            self.evaluation_criteria = update.evaluation_criteria;
        }
        if let Some(requirements) = update.requirements {
            self.requirements = requirements;
        }
        self.budget = budget;
        self.currency = currency;
        self.updated_at = now;
        Ok(())
    }

    /// Expose the request to vendors. The deadline must still be ahead.
    pub fn publish(&mut self, ctx: &AuthorizationContext, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_owner(ctx, "publish market requests")?;
        if self.status != MarketRequestStatus::Draft {
            return Err(self.invalid("publish"));
        }

        let mut missing = Vec::new();
        if !is_present(&self.title) {
            missing.push("title");
        }
        if !is_present(&self.description) {
            missing.push("description");
        }
        if !is_present(&self.category) {
            missing.push("category");
        }
        if self.deadline.is_none() {
            missing.push("deadline");
        }
        if !missing.is_empty() {
            return Err(WorkflowError::missing_fields(missing));
        }
        if let Some(deadline) = self.deadline {
            if deadline <= now {
                return Err(WorkflowError::Validation {
                    message: format!("deadline {deadline} is not in the future"),
                    fields: vec!["deadline".to_string()],
                });
            }
        }

        self.status = MarketRequestStatus::Published;
        self.published_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Mark a published request as actively collecting proposals
    pub fn activate(&mut self, ctx: &AuthorizationContext, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_owner(ctx, "activate market requests")?;
        if self.status != MarketRequestStatus::Published {
            return Err(self.invalid("activate"));
        }
        self.status = MarketRequestStatus::Active;
        self.updated_at = now;
        Ok(())
    }

    /// Stop accepting proposals. Submitted proposals are left untouched.
    pub fn close(&mut self, ctx: &AuthorizationContext, reason: &str, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_owner(ctx, "close market requests")?;
        if !self.status.is_open() {
            return Err(self.invalid("close"));
        }
        if !is_present(reason) {
            return Err(WorkflowError::missing_fields(vec!["reason"]));
        }
        self.status = MarketRequestStatus::Closed;
        self.close_reason = Some(reason.trim().to_string());
        self.closed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, ctx: &AuthorizationContext, reason: &str, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_owner(ctx, "cancel market requests")?;
        if self.status.is_terminal() {
            return Err(self.invalid("cancel"));
        }
        if !is_present(reason) {
            return Err(WorkflowError::missing_fields(vec!["reason"]));
        }
        self.status = MarketRequestStatus::Cancelled;
        self.cancellation_reason = Some(reason.trim().to_string());
        self.closed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Only drafts may be hard-deleted
    pub fn ensure_deletable(&self, ctx: &AuthorizationContext) -> WorkflowResult<()> {
        self.require_owner(ctx, "delete market requests")?;
        if self.status != MarketRequestStatus::Draft {
            return Err(self.invalid("delete"));
        }
        Ok(())
    }

    pub fn record_view(&mut self) {
        self.views_count = self.views_count.saturating_add(1);
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Open for proposals and the deadline has not passed
    pub fn ensure_accepting_proposals(&self, now: DateTime<Utc>) -> WorkflowResult<()> {
        if !self.status.is_open() {
            return Err(self.invalid("accept proposals for"));
        }
        if self.is_past_deadline(now) {
            return Err(WorkflowError::invalid_state(
                EntityKind::MarketRequest,
                &self.id,
                "past deadline",
                "accept proposals for",
            ));
        }
        Ok(())
    }

    /// Creator, admin, or a manager of the owning organization may award
    pub fn ensure_can_award(&self, ctx: &AuthorizationContext) -> WorkflowResult<()> {
        let manager = ctx.role == Role::Manager && ctx.belongs_to(&self.organization_id);
        if ctx.is(&self.created_by) || ctx.is_admin() || manager {
            Ok(())
        } else {
            Err(ctx.denied("award market requests"))
        }
    }

    pub(crate) fn attach_proposal(&mut self, proposal_id: &ProposalId) {
        if !self.proposals.contains(proposal_id) {
            self.proposals.push(proposal_id.clone());
        }
    }

    pub(crate) fn detach_proposal(&mut self, proposal_id: &ProposalId) {
        self.proposals.retain(|id| id != proposal_id);
    }

    pub(crate) fn mark_awarded(&mut self, proposal_id: &ProposalId, now: DateTime<Utc>) {
        self.status = MarketRequestStatus::Awarded;
        self.awarded_proposal_id = Some(proposal_id.clone());
        self.awarded_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::Duration;

    #[test]
    fn test_publish_requires_future_deadline() {
        let officer = officer();
        let mut market = MarketRequest::create(&officer, market_draft(Some(now() - Duration::days(1))), now()).unwrap();
        let err = market.publish(&officer, now()).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(market.status, MarketRequestStatus::Draft);

        market.deadline = Some(now() + Duration::days(7));
        market.publish(&officer, now()).unwrap();
        assert_eq!(market.status, MarketRequestStatus::Published);
        assert_eq!(market.published_at, Some(now()));
    }

    #[test]
    fn test_publish_twice_is_invalid_state() {
        let officer = officer();
        let mut market = published_market(&officer);
        let err = market.publish(&officer, now()).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState { ref current, .. } if current == "published"));
    }

    #[test]
    fn test_only_creator_or_admin_publishes() {
        let officer = officer();
        let mut market = MarketRequest::create(&officer, market_draft(Some(now() + Duration::days(3))), now()).unwrap();
        let colleague = AuthorizationContext::new("colleague", Role::Manager, ORG);
        assert_eq!(market.publish(&colleague, now()).unwrap_err().kind(), "authorization_error");
        market.publish(&admin(), now()).unwrap();
    }

    #[test]
    fn test_close_from_draft_is_invalid_state() {
        let officer = officer();
        let mut market = MarketRequest::create(&officer, market_draft(Some(now() + Duration::days(3))), now()).unwrap();
        let err = market.close(&officer, "budget cut", now()).unwrap_err();
        assert_eq!(err.kind(), "invalid_state_error");
        assert_eq!(market.status, MarketRequestStatus::Draft);
    }

    #[test]
    fn test_close_records_reason_and_blocks_proposals() {
        let officer = officer();
        let mut market = published_market(&officer);
        market.activate(&officer, now()).unwrap();
        market.close(&officer, "  enough responses ", now()).unwrap();
        assert_eq!(market.status, MarketRequestStatus::Closed);
        assert_eq!(market.close_reason.as_deref(), Some("enough responses"));
        assert_eq!(market.ensure_accepting_proposals(now()).unwrap_err().kind(), "invalid_state_error");
    }

    #[test]
    fn test_deadline_passing_blocks_proposals() {
        let officer = officer();
        let market = published_market(&officer);
        assert!(market.ensure_accepting_proposals(now()).is_ok());
        let later = now() + Duration::days(30);
        assert_eq!(market.ensure_accepting_proposals(later).unwrap_err().kind(), "invalid_state_error");
    }

    #[test]
    fn test_vendor_cannot_create_market_request() {
        let err = MarketRequest::create(&vendor("v1"), market_draft(None), now()).unwrap_err();
        assert_eq!(err.kind(), "authorization_error");
    }

    #[test]
    fn test_update_only_while_draft() {
        let officer = officer();
        let mut market = MarketRequest::create(&officer, market_draft(None), now()).unwrap();
        market
            .update(
                &officer,
                MarketRequestUpdate {
                    budget: Some(2500.0),
                    ..Default::default()
                },
                now(),
            )
            .unwrap();
        assert_eq!(market.budget, Some(2500.0));

        let mut published = published_market(&officer);
        let err = published.update(&officer, MarketRequestUpdate::default(), now()).unwrap_err();
        assert_eq!(err.kind(), "invalid_state_error");
    }

    #[test]
    fn test_manager_of_same_org_can_award() {
        let officer = officer();
        let market = published_market(&officer);
        assert!(market.ensure_can_award(&manager()).is_ok());
        let outsider = AuthorizationContext::new("m2", Role::Manager, "elsewhere");
        assert!(market.ensure_can_award(&outsider).is_err());
        assert!(market.ensure_can_award(&vendor("v1")).is_err());
    }

    #[test]
    fn test_cancel_is_terminal() {
        let officer = officer();
        let mut market = published_market(&officer);
        market.cancel(&officer, "requirement withdrawn", now()).unwrap();
        assert_eq!(market.status, MarketRequestStatus::Cancelled);
        assert_eq!(market.cancel(&officer, "again", now()).unwrap_err().kind(), "invalid_state_error");
    }

    #[test]
    fn test_status_vocabulary() {
        for status in MarketRequestStatus::ALL {
            assert_eq!(status.as_str().parse::<MarketRequestStatus>().unwrap(), status);
        }
        assert!(MarketRequestStatus::Active.is_open());
        assert!(!MarketRequestStatus::Closed.is_open());
    }
}
