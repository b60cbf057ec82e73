// Transition guards for contracts

use chrono::{DateTime, Duration, Utc};

use super::types::{Contract, ContractDraft, ContractStatus, ContractType};
use crate::auth::AuthorizationContext;
use crate::errors::{EntityKind, WorkflowError, WorkflowResult};
use crate::market::MarketRequest;
use crate::proposals::Proposal;
use crate::types::{is_currency_code, is_present, ContractId, PrincipalId};

/// Result of checking an active contract against its end date
#[derive(Debug, Clone, PartialEq)]
pub enum ExpiryOutcome {
    Unchanged,
    Renewed { new_end_date: DateTime<Utc> },
    Expired,
}

fn validate_terms(value: f64, currency: &str) -> WorkflowResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(WorkflowError::Validation {
            message: format!("contract value must be a non-negative amount, got {value}"),
            fields: vec!["value".to_string()],
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

fn validate_dates(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> WorkflowResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            return Err(WorkflowError::Validation {
                message: format!("end date {end} must be after start date {start}"),
                fields: vec!["endDate".to_string()],
            });
        }
    }
    Ok(())
}

impl Contract {
    /// Manually drafted contract, outside of an award
    pub fn create(ctx: &AuthorizationContext, draft: ContractDraft, now: DateTime<Utc>) -> WorkflowResult<Self> {
        ctx.require_staff("create contracts")?;
        if !is_present(&draft.title) {
            return Err(WorkflowError::missing_fields(vec!["title"]));
        }
        validate_terms(draft.value, &draft.currency)?;
        validate_dates(draft.start_date, draft.end_date)?;

        Ok(Self {
            id: ContractId::generate(),
            title: draft.title,
            vendor_id: draft.vendor_id,
            organization_id: ctx.organization_id.clone(),
            market_request_id: draft.market_request_id,
            proposal_id: None,
            value: draft.value,
            currency: draft.currency,
            status: ContractStatus::Draft,
            start_date: draft.start_date,
            end_date: draft.end_date,
            contract_type: draft.contract_type,
            category: draft.category,
            auto_renewal: draft.auto_renewal,
            renewal_count: 0,
            termination_reason: None,
            created_by: ctx.principal_id.clone(),
            audits: Vec::new(),
            activated_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Pending contract produced by awarding `winner` on `market`
    pub(crate) fn from_award(market: &MarketRequest, winner: &Proposal, awarded_by: &PrincipalId, now: DateTime<Utc>) -> Self {
        Self {
            id: ContractId::generate(),
            title: market.title.clone(),
            vendor_id: winner.vendor_id.clone(),
            organization_id: market.organization_id.clone(),
            market_request_id: Some(market.id.clone()),
            proposal_id: Some(winner.id.clone()),
            value: winner.total_price,
            currency: winner.currency.clone(),
            status: ContractStatus::Pending,
            start_date: None,
            end_date: None,
            contract_type: ContractType::FixedPrice,
            category: market.category.clone(),
            auto_renewal: false,
            renewal_count: 0,
            termination_reason: None,
            created_by: awarded_by.clone(),
            audits: Vec::new(),
            activated_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    fn invalid(&self, attempted: &str) -> WorkflowError {
        WorkflowError::invalid_state(EntityKind::Contract, &self.id, self.status, attempted)
    }

    /// Procurement staff of the owning organization
    pub(crate) fn require_staff(&self, ctx: &AuthorizationContext, action: &str) -> WorkflowResult<()> {
        if ctx.role.is_staff() && ctx.belongs_to(&self.organization_id) {
            Ok(())
        } else {
            Err(ctx.denied(action))
        }
    }

    pub fn submit(&mut self, ctx: &AuthorizationContext, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_staff(ctx, "submit contracts")?;
        if self.status != ContractStatus::Draft {
            return Err(self.invalid("submit"));
        }
        self.status = ContractStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    /// Put a pending contract in force. Dates given here override the
    /// drafted ones; the start defaults to `now`.
    pub fn activate(
        &mut self,
        ctx: &AuthorizationContext,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        self.require_staff(ctx, "activate contracts")?;
        if self.status != ContractStatus::Pending {
            return Err(self.invalid("activate"));
        }
        let start = start_date.or(self.start_date).unwrap_or(now);
        let Some(end) = end_date.or(self.end_date) else {
            return Err(WorkflowError::missing_fields(vec!["endDate"]));
        };
        validate_dates(Some(start), Some(end))?;

        self.start_date = Some(start);
        self.end_date = Some(end);
        self.status = ContractStatus::Active;
        self.activated_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(&mut self, ctx: &AuthorizationContext, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_staff(ctx, "complete contracts")?;
        if self.status != ContractStatus::Active {
            return Err(self.invalid("complete"));
        }
        self.status = ContractStatus::Completed;
        self.closed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn terminate(&mut self, ctx: &AuthorizationContext, reason: &str, now: DateTime<Utc>) -> WorkflowResult<()> {
        self.require_staff(ctx, "terminate contracts")?;
        if self.status.is_terminal() {
            return Err(self.invalid("terminate"));
        }
        if !is_present(reason) {
            return Err(WorkflowError::missing_fields(vec!["reason"]));
        }
        self.status = ContractStatus::Terminated;
        self.termination_reason = Some(reason.trim().to_string());
        self.closed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Expire an active contract whose end date has passed, or roll it over
    /// for another term of the same length when it auto-renews.
    pub fn refresh_expiry(&mut self, now: DateTime<Utc>) -> ExpiryOutcome {
        if self.status != ContractStatus::Active {
            return ExpiryOutcome::Unchanged;
        }
        let Some(end) = self.end_date else {
            return ExpiryOutcome::Unchanged;
        };
        if end > now {
            return ExpiryOutcome::Unchanged;
        }

        let renewal = match self.start_date {
            Some(start) if self.auto_renewal && end > start => renewed_term(start, end, now),
            _ => None,
        };
        match renewal {
            Some((new_start, new_end)) => {
                self.start_date = Some(new_start);
                self.end_date = Some(new_end);
                self.renewal_count += 1;
                self.updated_at = now;
                ExpiryOutcome::Renewed { new_end_date: new_end }
            }
            None => {
                self.status = ContractStatus::Expired;
                self.closed_at = Some(now);
                self.updated_at = now;
                ExpiryOutcome::Expired
            }
        }
    }
}

/// First term of the same length as `start..end` that ends after `now`.
/// None when the arithmetic leaves the representable date range.
fn renewed_term(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let term_ms = (end - start).num_milliseconds();
    if term_ms <= 0 {
        return None;
    }
    let elapsed_ms = (now - end).num_milliseconds();
    let terms = elapsed_ms / term_ms + 1;
    let advance = Duration::try_milliseconds(term_ms.checked_mul(terms)?)?;
    let new_end = end.checked_add_signed(advance)?;
    let new_start = new_end.checked_sub_signed(Duration::try_milliseconds(term_ms)?)?;
    Some((new_start, new_end))
}
