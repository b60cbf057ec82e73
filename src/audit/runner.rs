// Audit runs
//
// A run executes every registered compliance check against the contract,
// merges the findings supplied by the auditor, scores the result and
// appends a new AuditRecord.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{AuditRecord, AuditType, Finding, SeverityPenalties};
use crate::auth::AuthorizationContext;
use crate::contracts::{Contract, ContractStatus};
use crate::errors::{EntityKind, WorkflowError, WorkflowResult};
use crate::types::{is_present, PrincipalId, Severity};

/// Automated check run as part of every audit
pub trait ComplianceCheck: Send + Sync {
    fn name(&self) -> &'static str;

    fn inspect(&self, contract: &Contract, now: DateTime<Utc>) -> Vec<Finding>;
}

/// Start and end dates must be present on live contracts and in order
pub struct DateConsistencyCheck;

impl ComplianceCheck for DateConsistencyCheck {
    fn name(&self) -> &'static str {
        "date_consistency"
    }

    fn inspect(&self, contract: &Contract, _now: DateTime<Utc>) -> Vec<Finding> {
        match (contract.start_date, contract.end_date) {
            (Some(start), Some(end)) if end <= start => vec![Finding::new(
                "Contract dates are inconsistent",
                format!("End date {end} is not after start date {start}"),
                Severity::High,
            )
            .with_recommendation("Correct the contract term")
            .raised_by(self.name())],
            (_, None) if contract.status == ContractStatus::Active => vec![Finding::new(
                "Active contract has no end date",
                "The contract is in force without a defined term",
                Severity::Medium,
            )
            .with_recommendation("Record the agreed end date")
            .raised_by(self.name())],
            _ => Vec::new(),
        }
    }
}

/// Active contracts past their end date
pub struct PastDueCheck;

impl ComplianceCheck for PastDueCheck {
    fn name(&self) -> &'static str {
        "past_due"
    }

    fn inspect(&self, contract: &Contract, now: DateTime<Utc>) -> Vec<Finding> {
        match contract.end_date {
            Some(end) if contract.status == ContractStatus::Active && end <= now => vec![Finding::new(
                "Contract is past its end date",
                format!("Contract ended on {} but is still active", end.date_naive()),
                Severity::High,
            )
            .with_recommendation("Renew, complete or terminate the contract")
            .raised_by(self.name())],
            _ => Vec::new(),
        }
    }
}

/// Active contracts close to expiry with no renewal arranged
pub struct ExpiryWithoutRenewalCheck {
    pub warning_days: i64,
}

impl ComplianceCheck for ExpiryWithoutRenewalCheck {
    fn name(&self) -> &'static str {
        "expiry_without_renewal"
    }

    fn inspect(&self, contract: &Contract, now: DateTime<Utc>) -> Vec<Finding> {
        if contract.status != ContractStatus::Active || contract.auto_renewal {
            return Vec::new();
        }
        match contract.days_until_expiry(now) {
            Some(days) if days > 0 && days <= self.warning_days => vec![Finding::new(
                "Contract expires soon without renewal",
                format!("Contract expires in {days} days and does not auto-renew"),
                Severity::Low,
            )
            .with_recommendation("Plan a renewal or replacement procurement")
            .raised_by(self.name())],
            _ => Vec::new(),
        }
    }
}

pub struct ContractValueCheck;

impl ComplianceCheck for ContractValueCheck {
    fn name(&self) -> &'static str {
        "contract_value"
    }

    fn inspect(&self, contract: &Contract, _now: DateTime<Utc>) -> Vec<Finding> {
        if contract.value > 0.0 {
            return Vec::new();
        }
        vec![Finding::new(
            "Contract value is not positive",
            format!("Recorded value is {} {}", contract.value, contract.currency),
            Severity::Medium,
        )
        .with_recommendation("Record the committed contract value")
        .raised_by(self.name())]
    }
}

/// High or critical findings left unresolved on earlier audits. Findings
/// this check raised itself are not counted again.
pub struct CarriedFindingsCheck;

impl ComplianceCheck for CarriedFindingsCheck {
    fn name(&self) -> &'static str {
        "carried_findings"
    }

    fn inspect(&self, contract: &Contract, _now: DateTime<Utc>) -> Vec<Finding> {
        let carried: Vec<&Finding> = contract
            .audits
            .iter()
            .flat_map(|audit| audit.unresolved_findings())
            .filter(|f| f.severity >= Severity::High && f.check.as_deref() != Some(self.name()))
            .collect();
        let Some(worst) = carried.iter().map(|f| f.severity).max() else {
            return Vec::new();
        };
        vec![Finding::new(
            "Unresolved findings from earlier audits",
            format!("{} high or critical findings remain open", carried.len()),
            worst,
        )
        .with_recommendation("Resolve outstanding findings before the next review")
        .raised_by(self.name())]
    }
}

/// Finding supplied by the auditor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFinding {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub recommendation: Option<String>,
    pub assigned_to: Option<PrincipalId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequest {
    #[serde(default)]
    pub audit_type: AuditType,
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub findings: Vec<NewFinding>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub notes: Option<String>,
}

pub struct AuditRunner {
    checks: Vec<Box<dyn ComplianceCheck>>,
    penalties: SeverityPenalties,
}

impl AuditRunner {
    /// Runner with every built-in check registered
    pub fn new(penalties: SeverityPenalties, expiry_warning_days: i64) -> Self {
        Self::without_checks(penalties)
            .with_check(DateConsistencyCheck)
            .with_check(PastDueCheck)
            .with_check(ExpiryWithoutRenewalCheck {
                warning_days: expiry_warning_days,
            })
            .with_check(ContractValueCheck)
            .with_check(CarriedFindingsCheck)
    }

    pub fn without_checks(penalties: SeverityPenalties) -> Self {
        Self {
            checks: Vec::new(),
            penalties,
        }
    }

    pub fn with_check(mut self, check: impl ComplianceCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Audit `contract` and append the record. Returns the new audit index.
    pub fn run(
        &self,
        ctx: &AuthorizationContext,
        contract: &mut Contract,
        request: AuditRequest,
        now: DateTime<Utc>,
    ) -> WorkflowResult<usize> {
        ctx.require_reviewer("run audits", &contract.organization_id)?;
        if contract.status == ContractStatus::Draft {
            return Err(WorkflowError::invalid_state(EntityKind::Contract, &contract.id, contract.status, "audit"));
        }
        if let Some(score) = request.overall_score {
            if !score.is_finite() || !(0.0..=100.0).contains(&score) {
                return Err(WorkflowError::Validation {
                    message: format!("overall score must be between 0 and 100, got {score}"),
                    fields: vec!["overallScore".to_string()],
                });
            }
        }
        if request.findings.iter().any(|f| !is_present(&f.title)) {
            return Err(WorkflowError::missing_fields(vec!["findings.title"]));
        }

        let mut findings = Vec::new();
        for check in &self.checks {
            let raised = check.inspect(contract, now);
            debug!(check = check.name(), raised = raised.len(), contract_id = %contract.id, "Compliance check finished");
            findings.extend(raised);
        }
        findings.extend(request.findings.into_iter().map(|f| {
            let mut finding = Finding::new(f.title, f.description, f.severity);
            finding.recommendation = f.recommendation;
            finding.assigned_to = f.assigned_to;
            finding
        }));

        let mut recommendations = request.recommendations;
        for recommendation in findings.iter().filter_map(|f| f.recommendation.as_ref()) {
            if !recommendations.contains(recommendation) {
                recommendations.push(recommendation.clone());
            }
        }

        let compliance_score = self.penalties.compliance_score(&findings);
        let risk_level = findings
            .iter()
            .filter(|f| f.status.is_unresolved())
            .map(|f| f.severity)
            .max()
            .unwrap_or(Severity::Low);

        let record = AuditRecord {
            audit_date: now,
            audited_by: ctx.principal_id.clone(),
            audit_type: request.audit_type,
            overall_score: request.overall_score.unwrap_or(compliance_score),
            compliance_score,
            risk_level,
            findings,
            recommendations,
            notes: request.notes,
        };
        Ok(contract.append_audit(record, now))
    }
}
