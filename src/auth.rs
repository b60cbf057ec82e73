// Authorization context threaded into every transition
//
// The engine never authenticates. Callers hand over an already authenticated
// principal and every guard is a predicate over (context, entity, transition).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::WorkflowError;
use crate::types::{OrganizationId, PrincipalId};

/// Roles known to the workflow engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Vendor,
    ProcurementOfficer,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Vendor => "vendor",
            Role::ProcurementOfficer => "procurement_officer",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// Internal employee of a buying organization
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Vendor)
    }

    /// Roles allowed to evaluate and reject proposals
    pub fn is_reviewer(&self) -> bool {
        matches!(self, Role::ProcurementOfficer | Role::Manager | Role::Admin)
    }

    /// Roles allowed to approve or reject RFP requests
    pub fn is_approver(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }

    /// Roles allowed to edit audit findings
    pub fn can_edit_findings(&self) -> bool {
        matches!(self, Role::ProcurementOfficer | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vendor" => Ok(Role::Vendor),
            "procurement_officer" => Ok(Role::ProcurementOfficer),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Authenticated principal supplied per call by the identity collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationContext {
    pub principal_id: PrincipalId,
    pub role: Role,
    pub organization_id: OrganizationId,
}

impl AuthorizationContext {
    pub fn new(
        principal_id: impl Into<PrincipalId>,
        role: Role,
        organization_id: impl Into<OrganizationId>,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            role,
            organization_id: organization_id.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is(&self, principal: &PrincipalId) -> bool {
        &self.principal_id == principal
    }

    /// Admins act across organizations, everyone else only inside their own
    pub fn belongs_to(&self, organization: &OrganizationId) -> bool {
        self.is_admin() || &self.organization_id == organization
    }

    pub fn require_staff(&self, action: &str) -> Result<(), WorkflowError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(self.denied(action))
        }
    }

    pub fn require_reviewer(&self, action: &str, organization: &OrganizationId) -> Result<(), WorkflowError> {
        if self.role.is_reviewer() && self.belongs_to(organization) {
            Ok(())
        } else {
            Err(self.denied(action))
        }
    }

    /// Owner of the entity, or an admin
    pub fn require_owner_or_admin(&self, action: &str, owner: &PrincipalId) -> Result<(), WorkflowError> {
        if self.is(owner) || self.is_admin() {
            Ok(())
        } else {
            Err(self.denied(action))
        }
    }

    pub fn denied(&self, action: &str) -> WorkflowError {
        WorkflowError::Authorization {
            principal: self.principal_id.to_string(),
            role: self.role,
            action: action.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_vocabulary_round_trips() {
        for role in [Role::Vendor, Role::ProcurementOfficer, Role::Manager, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(serde_json::to_string(&role).unwrap(), format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn test_role_groups() {
        assert!(!Role::Vendor.is_staff());
        assert!(Role::ProcurementOfficer.is_reviewer());
        assert!(!Role::ProcurementOfficer.is_approver());
        assert!(Role::Manager.is_approver());
        assert!(!Role::Manager.can_edit_findings());
        assert!(Role::Admin.can_edit_findings());
    }

    #[test]
    fn test_reviewer_must_share_organization_unless_admin() {
        let org = OrganizationId::from("acme");
        let officer = AuthorizationContext::new("u1", Role::ProcurementOfficer, "other-org");
        assert!(matches!(
            officer.require_reviewer("evaluate", &org),
            Err(WorkflowError::Authorization { .. })
        ));

        let admin = AuthorizationContext::new("root", Role::Admin, "other-org");
        assert!(admin.require_reviewer("evaluate", &org).is_ok());
    }
}
