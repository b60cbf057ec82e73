// Transition guards for RFP requests

use chrono::{DateTime, Utc};

use super::types::{ManagerApproval, RfpDraft, RfpRequest, RfpStatus, RfpUpdate};
use crate::auth::AuthorizationContext;
use crate::errors::{EntityKind, WorkflowError, WorkflowResult};
use crate::market::{MarketRequest, MarketRequestDraft};
use crate::types::{is_currency_code, is_present, RfpRequestId};

fn validate_budget(budget: Option<f64>) -> WorkflowResult<()> {
    match budget {
        Some(b) if !b.is_finite() || b < 0.0 => Err(WorkflowError::Validation {
            message: format!("budget estimate must be a non-negative amount, got {b}"),
            fields: vec!["budgetEstimate".to_string()],
        }),
        _ => Ok(()),
    }
}

fn validate_currency(currency: &str) -> WorkflowResult<()> {
    if is_currency_code(currency) {
        Ok(())
    } else {
        Err(WorkflowError::Validation {
            message: format!("currency '{currency}' is not a three-letter code"),
            fields: vec!["currency".to_string()],
        })
    }
}

impl RfpRequest {
    pub fn create(ctx: &AuthorizationContext, draft: RfpDraft, now: DateTime<Utc>) -> WorkflowResult<Self> {
        ctx.require_staff("create RFP requests")?;
        if !is_present(&draft.title) {
            return Err(WorkflowError::missing_fields(vec!["title"]));
        }
        validate_budget(draft.budget_estimate)?;
        validate_currency(&draft.currency)?;

        Ok(Self {
            id: RfpRequestId::generate(),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            urgency: draft.urgency,
            budget_estimate: draft.budget_estimate,
            currency: draft.currency,
            quantity: draft.quantity,
            justification: draft.justification,
            expected_delivery_date: draft.expected_delivery_date,
            requirements: draft.requirements,
            specifications: draft.specifications,
            status: RfpStatus::Draft,
            created_by: ctx.principal_id.clone(),
            organization_id: ctx.organization_id.clone(),
            review_notes: None,
            manager_approval: None,
            submitted_at: None,
            converted_to: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    fn invalid(&self, attempted: &str) -> WorkflowError {
        WorkflowError::invalid_state(EntityKind::RfpRequest, &self.id, self.status, attempted)
    }

    fn require_approver(&self, ctx: &AuthorizationContext, action: &str) -> WorkflowResult<()> {
        if ctx.role.is_approver() && ctx.belongs_to(&self.organization_id) {
            Ok(())
        } else {
            Err(ctx.denied(action))
        }
    }

    /// Edit while draft or rejected. Editing a rejected request puts it back
    /// into draft so it can be resubmitted.
    pub fn update(&mut self, ctx: &AuthorizationContext, update: RfpUpdate, now: DateTime<Utc>) -> WorkflowResult<()> {
        ctx.require_owner_or_admin("edit RFP requests", &self.created_by)?;
        if !self.status.is_editable() {
            return Err(self.invalid("edit"));
        }

        let budget = update.budget_estimate.or(self.budget_estimate);
        validate_budget(budget)?;
        let currency = update.currency.clone().unwrap_or_else(|| self.currency.clone());
        validate_currency(&currency)?;
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
        if let Some(urgency) = update.urgency {
            self.urgency = urgency;
        }
        if update.quantity.is_some() {
            self.quantity = update.quantity;
        }
        if update.justification.is_some() {
            self.justification = update.justification;
        }
        if update.expected_delivery_date.is_some() {
            self.expected_delivery_date = update.expected_delivery_date;
        }
        if let Some(requirements) = update.requirements {
            self.requirements = requirements;
        }
        if update.specifications.is_some() {
            self.specifications = update.specifications;
        }
        self.budget_estimate = budget;
        self.currency = currency;
        self.status = RfpStatus::Draft;
        self.updated_at = now;
        Ok(())
    }

    pub fn submit_for_review(&mut self, ctx: &AuthorizationContext, now: DateTime<Utc>) -> WorkflowResult<()> {
        ctx.require_owner_or_admin("submit RFP requests", &self.created_by)?;
        if self.status != RfpStatus::Draft {
            return Err(self.invalid("submit for review"));
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
        if !self.budget_estimate.is_some_and(|b| b > 0.0) {
            missing.push("budgetEstimate");
        }
        if self.expected_delivery_date.is_none() {
            missing.push("expectedDeliveryDate");
        }
        if !missing.is_empty() {
            return Err(WorkflowError::missing_fields(missing));
        }

        self.status = RfpStatus::Review;
        self.submitted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn approve(&mut self, ctx: &AuthorizationContext, notes: Option<String>, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.decide(ctx, true, notes, now)
    }

    /// Rejection must tell the owner what to change
    pub fn reject(&mut self, ctx: &AuthorizationContext, notes: &str, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_approver(ctx, "review RFP requests")?;
        if self.status != RfpStatus::Review {
            return Err(self.invalid("reject"));
        }
        if !is_present(notes) {
            return Err(WorkflowError::missing_fields(vec!["reviewNotes"]));
        }
        self.decide(ctx, false, Some(notes.trim().to_string()), now)
    }

    fn decide(&mut self, ctx: &AuthorizationContext, approved: bool, notes: Option<String>, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_approver(ctx, "review RFP requests")?;
        if self.status != RfpStatus::Review {
            return Err(self.invalid(if approved { "approve" } else { "reject" }));
        }
        self.status = if approved { RfpStatus::Approved } else { RfpStatus::Rejected };
        self.review_notes = notes.clone();
        self.manager_approval = Some(ManagerApproval {
            decided_by: ctx.principal_id.clone(),
            approved,
            decided_at: now,
            notes,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Drafts that were never reviewed may be deleted by their owner
    pub fn ensure_deletable(&self, ctx: &AuthorizationContext) -> WorkflowResult<()> {
        ctx.require_owner_or_admin("delete RFP requests", &self.created_by)?;
        if self.status != RfpStatus::Draft {
            return Err(self.invalid("delete"));
        }
        if self.manager_approval.is_some() {
            return Err(WorkflowError::invalid_state(EntityKind::RfpRequest, &self.id, "reviewed", "delete"));
        }
        Ok(())
    }

    /// Build a draft market request from an approved RFP and remember the
    /// link. Both records must be persisted together.
    pub fn convert(&mut self, ctx: &AuthorizationContext, now: DateTime<Utc>) -> WorkflowResult<MarketRequest> {
        ctx.require_staff("convert RFP requests")?;
        if !ctx.belongs_to(&self.organization_id) {
            return Err(ctx.denied("convert RFP requests"));
        }
        if self.status != RfpStatus::Approved {
            return Err(self.invalid("convert"));
        }
        if self.converted_to.is_some() {
            return Err(WorkflowError::invalid_state(EntityKind::RfpRequest, &self.id, "converted", "convert"));
        }

        let draft = MarketRequestDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            budget: self.budget_estimate,
            currency: self.currency.clone(),
            deadline: self.expected_delivery_date,
            quantity: self.quantity,
            specifications: self.specifications.clone(),
            evaluation_criteria: None,
            requirements: self.requirements.clone(),
        };
        let mut market = MarketRequest::create(ctx, draft, now)?;
        market.organization_id = self.organization_id.clone();
        market.source_rfp_request_id = Some(self.id.clone());

        self.converted_to = Some(market.id.clone());
        self.updated_at = now;
        Ok(market)
    }
}
