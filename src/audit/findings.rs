// In-place edits of findings on recorded audits

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{AuditRecord, Finding, FindingStatus, FindingUpdate};
use crate::auth::AuthorizationContext;
use crate::contracts::Contract;
use crate::errors::{EntityKind, WorkflowError, WorkflowResult};
use crate::types::Severity;

/// What an accepted finding update did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingChange {
    pub audit_index: usize,
    pub finding_index: usize,
    pub severity: Severity,
    pub previous: FindingStatus,
    pub current: FindingStatus,
}

impl FindingChange {
    pub fn resolved(&self) -> bool {
        self.previous != FindingStatus::Resolved && self.current == FindingStatus::Resolved
    }
}

impl Finding {
    /// Apply `update` if the status machine allows it. Moving into
    /// `resolved` stamps `resolved_at`.
    pub fn apply(&mut self, update: FindingUpdate, now: DateTime<Utc>) -> Result<(), FindingStatus> {
        let next = update.status.unwrap_or(self.status);
        if !self.status.can_transition_to(next) {
            return Err(next);
        }
        if next == FindingStatus::Resolved && self.status != FindingStatus::Resolved {
            self.resolved_at = Some(now);
        }
        self.status = next;
        if update.resolution.is_some() {
            self.resolution = update.resolution;
        }
        if update.assigned_to.is_some() {
            self.assigned_to = update.assigned_to;
        }
        Ok(())
    }
}

impl Contract {
    /// Append a finished audit. History is never rewritten.
    pub(crate) fn append_audit(&mut self, record: AuditRecord, now: DateTime<Utc>) -> usize {
        self.audits.push(record);
        self.updated_at = now;
        self.audits.len() - 1
    }

    /// Edit status, resolution or assignee of one finding. Only procurement
    /// officers and admins may do this.
    pub fn update_finding(
        &mut self,
        ctx: &AuthorizationContext,
        audit_index: usize,
        finding_index: usize,
        update: FindingUpdate,
        now: DateTime<Utc>,
    ) -> WorkflowResult<FindingChange> {
        if !(ctx.role.can_edit_findings() && ctx.belongs_to(&self.organization_id)) {
            return Err(ctx.denied("edit audit findings"));
        }
        let contract_id = self.id.clone();
        let audit = self
            .audits
            .get_mut(audit_index)
            .ok_or_else(|| WorkflowError::not_found(EntityKind::AuditRecord, format!("{contract_id}/audits/{audit_index}")))?;
        let finding_ref = format!("{contract_id}/audits/{audit_index}/findings/{finding_index}");
        let finding = audit
            .findings
            .get_mut(finding_index)
            .ok_or_else(|| WorkflowError::not_found(EntityKind::Finding, &finding_ref))?;

        let previous = finding.status;
        let severity = finding.severity;
        finding.apply(update, now).map_err(|next| {
            WorkflowError::invalid_state(EntityKind::Finding, &finding_ref, previous, &format!("move to '{next}'"))
        })?;
        let current = finding.status;

        self.updated_at = now;
        Ok(FindingChange {
            audit_index,
            finding_index,
            severity,
            previous,
            current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditType, Finding};
    use crate::auth::Role;
    use crate::test_support::*;
    use crate::types::PrincipalId;

    fn audited_contract() -> Contract {
        let mut contract = active_contract();
        let record = AuditRecord {
            audit_date: now(),
            audited_by: "officer-1".into(),
            audit_type: AuditType::Compliance,
            overall_score: 70.0,
            compliance_score: 70.0,
            risk_level: Severity::Critical,
            findings: vec![
                Finding::new("Missing insurance certificate", "Certificate expired", Severity::High),
                Finding::new("Unsigned annex", "Annex B unsigned", Severity::Critical),
            ],
            recommendations: Vec::new(),
            notes: None,
        };
        contract.append_audit(record, now());
        contract
    }

    #[test]
    fn test_resolving_stamps_resolved_at() {
        let mut contract = audited_contract();
        let update = FindingUpdate {
            status: Some(FindingStatus::Resolved),
            resolution: Some("Signed copy filed".into()),
            assigned_to: None,
        };
        let change = contract.update_finding(&officer(), 0, 1, update, now()).unwrap();
        assert!(change.resolved());
        let finding = &contract.audits[0].findings[1];
        assert_eq!(finding.resolved_at, Some(now()));
        assert_eq!(finding.resolution.as_deref(), Some("Signed copy filed"));
        assert_eq!(contract.audits[0].current_risk_level(), Severity::High);
        assert_eq!(contract.audits[0].risk_level, Severity::Critical);
    }

    #[test]
    fn test_resolved_finding_cannot_reopen() {
        let mut contract = audited_contract();
        let resolve = FindingUpdate {
            status: Some(FindingStatus::Resolved),
            ..Default::default()
        };
        contract.update_finding(&officer(), 0, 0, resolve, now()).unwrap();
        let reopen = FindingUpdate {
            status: Some(FindingStatus::Open),
            ..Default::default()
        };
        let err = contract.update_finding(&officer(), 0, 0, reopen, now()).unwrap_err();
        assert_eq!(err.kind(), "invalid_state_error");
        assert_eq!(contract.audits[0].findings[0].status, FindingStatus::Resolved);
    }

    #[test]
    fn test_closed_finding_rejects_any_edit() {
        let mut contract = audited_contract();
        for status in [FindingStatus::Resolved, FindingStatus::Closed] {
            let update = FindingUpdate {
                status: Some(status),
                ..Default::default()
            };
            contract.update_finding(&admin(), 0, 0, update, now()).unwrap();
        }
        let reassign = FindingUpdate {
            assigned_to: Some(PrincipalId::from("someone")),
            ..Default::default()
        };
        let err = contract.update_finding(&officer(), 0, 0, reassign, now()).unwrap_err();
        assert_eq!(err.kind(), "invalid_state_error");
        assert!(contract.audits[0].findings[0].assigned_to.is_none());
    }

    #[test]
    fn test_manager_cannot_edit_findings() {
        let mut contract = audited_contract();
        let err = contract
            .update_finding(&manager(), 0, 0, FindingUpdate::default(), now())
            .unwrap_err();
        assert_eq!(err.kind(), "authorization_error");
        let foreign = AuthorizationContext::new("o2", Role::ProcurementOfficer, "elsewhere");
        let err = contract
            .update_finding(&foreign, 0, 0, FindingUpdate::default(), now())
            .unwrap_err();
        assert_eq!(err.kind(), "authorization_error");
    }

    #[test]
    fn test_out_of_range_indices_are_not_found() {
        let mut contract = audited_contract();
        let err = contract.update_finding(&officer(), 3, 0, FindingUpdate::default(), now()).unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { entity: EntityKind::AuditRecord, .. }));
        let err = contract.update_finding(&officer(), 0, 9, FindingUpdate::default(), now()).unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { entity: EntityKind::Finding, .. }));
    }

    #[test]
    fn test_acknowledge_then_assign() {
        let mut contract = audited_contract();
        let update = FindingUpdate {
            status: Some(FindingStatus::Acknowledged),
            resolution: None,
            assigned_to: Some("vendor-contact".into()),
        };
        let change = contract.update_finding(&officer(), 0, 0, update, now()).unwrap();
        assert_eq!(change.previous, FindingStatus::Open);
        assert_eq!(change.current, FindingStatus::Acknowledged);
        assert!(!change.resolved());
        assert!(contract.audits[0].findings[0].resolved_at.is_none());
    }
}
