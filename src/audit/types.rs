use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{PrincipalId, RiskLevel, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Open,
    Acknowledged,
    Resolved,
    Closed,
}

impl FindingStatus {
    pub const ALL: [FindingStatus; 4] = [
        FindingStatus::Open,
        FindingStatus::Acknowledged,
        FindingStatus::Resolved,
        FindingStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Open => "open",
            FindingStatus::Acknowledged => "acknowledged",
            FindingStatus::Resolved => "resolved",
            FindingStatus::Closed => "closed",
        }
    }

    /// Still counts toward the risk level of its audit
    pub fn is_unresolved(&self) -> bool {
        matches!(self, FindingStatus::Open | FindingStatus::Acknowledged)
    }

    /// Legal moves of the finding status machine. Staying put is allowed
    /// everywhere except `closed`, which accepts no edits at all.
    pub fn can_transition_to(&self, next: FindingStatus) -> bool {
        use FindingStatus::*;
        matches!(
            (self, next),
            (Open, Open)
                | (Open, Acknowledged)
                | (Open, Resolved)
                | (Acknowledged, Acknowledged)
                | (Acknowledged, Resolved)
                | (Resolved, Resolved)
                | (Resolved, Closed)
        )
    }
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FindingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FindingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown finding status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditType {
    #[default]
    Routine,
    Compliance,
    Financial,
    Performance,
    Incident,
}

/// Single compliance or risk issue raised by an audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: FindingStatus,
    pub recommendation: Option<String>,
    pub resolution: Option<String>,
    pub assigned_to: Option<PrincipalId>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Name of the automated check that raised it, absent for manual findings
    pub check: Option<String>,
}

impl Finding {
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
            status: FindingStatus::Open,
            recommendation: None,
            resolution: None,
            assigned_to: None,
            resolved_at: None,
            check: None,
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn raised_by(mut self, check: &str) -> Self {
        self.check = Some(check.to_string());
        self
    }
}

/// Fields of a finding that may change after the audit was recorded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingUpdate {
    pub status: Option<FindingStatus>,
    pub resolution: Option<String>,
    pub assigned_to: Option<PrincipalId>,
}

/// One audit run against a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub audit_date: DateTime<Utc>,
    pub audited_by: PrincipalId,
    pub audit_type: AuditType,
    pub overall_score: f64,
    pub compliance_score: f64,
    /// Risk level as recorded when the audit ran
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub notes: Option<String>,
}

impl AuditRecord {
    /// Worst severity among open or acknowledged findings
    pub fn max_unresolved_severity(&self) -> Option<Severity> {
        self.findings
            .iter()
            .filter(|f| f.status.is_unresolved())
            .map(|f| f.severity)
            .max()
    }

    /// Risk derived from unresolved findings. Once every finding is resolved
    /// the recorded level stands.
    pub fn current_risk_level(&self) -> RiskLevel {
        self.max_unresolved_severity().unwrap_or(self.risk_level)
    }

    pub fn unresolved_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.status.is_unresolved())
    }
}

/// Compliance score penalty per unresolved finding, by severity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityPenalties {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for SeverityPenalties {
    fn default() -> Self {
        Self {
            low: 2.0,
            medium: 5.0,
            high: 15.0,
            critical: 30.0,
        }
    }
}

impl SeverityPenalties {
    pub fn for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }

    /// `max(0, 100 - sum of penalties)` over unresolved findings
    pub fn compliance_score<'a>(&self, findings: impl IntoIterator<Item = &'a Finding>) -> f64 {
        let penalty: f64 = findings
            .into_iter()
            .filter(|f| f.status.is_unresolved())
            .map(|f| self.for_severity(f.severity))
            .sum();
        (100.0 - penalty).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(findings: Vec<Finding>, recorded: RiskLevel) -> AuditRecord {
        AuditRecord {
            audit_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            audited_by: "auditor".into(),
            audit_type: AuditType::Routine,
            overall_score: 80.0,
            compliance_score: 80.0,
            risk_level: recorded,
            findings,
            recommendations: Vec::new(),
            notes: None,
        }
    }

    fn finding(severity: Severity, status: FindingStatus) -> Finding {
        let mut f = Finding::new("issue", "details", severity);
        f.status = status;
        f
    }

    #[test]
    fn test_risk_ignores_resolved_findings() {
        let audit = record(
            vec![
                finding(Severity::High, FindingStatus::Open),
                finding(Severity::Critical, FindingStatus::Resolved),
            ],
            Severity::Critical,
        );
        assert_eq!(audit.current_risk_level(), Severity::High);
    }

    #[test]
    fn test_risk_keeps_recorded_level_when_nothing_unresolved() {
        let audit = record(vec![finding(Severity::Critical, FindingStatus::Closed)], Severity::Medium);
        assert_eq!(audit.current_risk_level(), Severity::Medium);
    }

    #[test]
    fn test_acknowledged_counts_as_unresolved() {
        let audit = record(
            vec![
                finding(Severity::Low, FindingStatus::Open),
                finding(Severity::Critical, FindingStatus::Acknowledged),
            ],
            Severity::Low,
        );
        assert_eq!(audit.current_risk_level(), Severity::Critical);
    }

    #[test]
    fn test_status_machine_forbids_reopening_and_leaving_closed() {
        assert!(!FindingStatus::Resolved.can_transition_to(FindingStatus::Open));
        assert!(!FindingStatus::Acknowledged.can_transition_to(FindingStatus::Open));
        for next in FindingStatus::ALL {
            assert!(!FindingStatus::Closed.can_transition_to(next));
        }
        assert!(FindingStatus::Open.can_transition_to(FindingStatus::Resolved));
        assert!(FindingStatus::Resolved.can_transition_to(FindingStatus::Closed));
    }

    #[test]
    fn test_compliance_score_floors_at_zero() {
        let penalties = SeverityPenalties::default();
        let findings = vec![
            finding(Severity::Critical, FindingStatus::Open),
            finding(Severity::Critical, FindingStatus::Open),
            finding(Severity::Critical, FindingStatus::Acknowledged),
            finding(Severity::High, FindingStatus::Open),
        ];
        assert_eq!(penalties.compliance_score(&findings), 0.0);

        let findings = vec![
            finding(Severity::High, FindingStatus::Open),
            finding(Severity::Medium, FindingStatus::Resolved),
        ];
        assert_eq!(penalties.compliance_score(&findings), 85.0);
    }
}
