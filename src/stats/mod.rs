// Derived statistics
//
// Read-only projections over collections of entities. Nothing here is
// stored and nothing here mutates its inputs.

pub mod aggregates;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use aggregates::{AuditStats, ContractStats, MarketStats, ProcurementDashboard, RfpStats, VendorStats};

/// `accepted / total`, zero when there is nothing to count
pub fn win_rate(accepted: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    accepted.min(total) as f64 / total as f64
}

pub fn avg_proposals_per_request(total_proposals: usize, total_requests: usize) -> f64 {
    if total_requests == 0 {
        return 0.0;
    }
    total_proposals as f64 / total_requests as f64
}

/// Average rounded to the nearest whole proposal for display
pub fn avg_proposals_per_request_display(total_proposals: usize, total_requests: usize) -> u64 {
    avg_proposals_per_request(total_proposals, total_requests).round() as u64
}

/// Percentage of contracts with at least one audit
pub fn audit_coverage(audited_contracts: usize, total_contracts: usize) -> f64 {
    if total_contracts == 0 {
        return 0.0;
    }
    audited_contracts.min(total_contracts) as f64 / total_contracts as f64 * 100.0
}

/// Color band for a compliance score. Display only, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceBand {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl ComplianceBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            ComplianceBand::Excellent
        } else if score >= 75.0 {
            ComplianceBand::Good
        } else if score >= 60.0 {
            ComplianceBand::Fair
        } else {
            ComplianceBand::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceBand::Poor => "poor",
            ComplianceBand::Fair => "fair",
            ComplianceBand::Good => "good",
            ComplianceBand::Excellent => "excellent",
        }
    }
}

impl fmt::Display for ComplianceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_rate_handles_zero_total() {
        assert_eq!(win_rate(0, 0), 0.0);
        assert_eq!(win_rate(1, 4), 0.25);
    }

    #[test]
    fn test_avg_proposals_rounds_for_display() {
        assert_eq!(avg_proposals_per_request(0, 0), 0.0);
        assert_eq!(avg_proposals_per_request(7, 2), 3.5);
        assert_eq!(avg_proposals_per_request_display(7, 2), 4);
        assert_eq!(avg_proposals_per_request_display(5, 3), 2);
    }

    #[test]
    fn test_audit_coverage_percentage() {
        assert_eq!(audit_coverage(0, 0), 0.0);
        assert_eq!(audit_coverage(3, 4), 75.0);
    }

    #[test]
    fn test_compliance_band_thresholds() {
        assert_eq!(ComplianceBand::from_score(90.0), ComplianceBand::Excellent);
        assert_eq!(ComplianceBand::from_score(89.9), ComplianceBand::Good);
        assert_eq!(ComplianceBand::from_score(75.0), ComplianceBand::Good);
        assert_eq!(ComplianceBand::from_score(60.0), ComplianceBand::Fair);
        assert_eq!(ComplianceBand::from_score(59.99), ComplianceBand::Poor);
    }
}
