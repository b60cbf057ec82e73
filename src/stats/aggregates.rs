use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{audit_coverage, avg_proposals_per_request, avg_proposals_per_request_display, win_rate, ComplianceBand};
use crate::contracts::{Contract, ContractStatus};
use crate::market::MarketRequest;
use crate::proposals::{Proposal, ProposalStatus};
use crate::rfp::{RfpRequest, RfpStatus};
use crate::types::{PrincipalId, Severity};

/// Proposal outcomes for one vendor. Drafts are not counted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorStats {
    pub vendor_id: PrincipalId,
    pub total_proposals: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub withdrawn: usize,
    pub pending: usize,
    pub win_rate: f64,
    pub awarded_value: f64,
}

impl VendorStats {
    pub fn for_vendor(vendor_id: &PrincipalId, proposals: &[Proposal]) -> Self {
        let mut stats = Self {
            vendor_id: vendor_id.clone(),
            total_proposals: 0,
            accepted: 0,
            rejected: 0,
            withdrawn: 0,
            pending: 0,
            win_rate: 0.0,
            awarded_value: 0.0,
        };
        for proposal in proposals.iter().filter(|p| &p.vendor_id == vendor_id) {
            match proposal.status {
                ProposalStatus::Draft => continue,
                ProposalStatus::Submitted | ProposalStatus::UnderReview => stats.pending += 1,
                ProposalStatus::Accepted => {
                    stats.accepted += 1;
                    stats.awarded_value += proposal.total_price;
                }
                ProposalStatus::Rejected => stats.rejected += 1,
                ProposalStatus::Withdrawn => stats.withdrawn += 1,
            }
            stats.total_proposals += 1;
        }
        stats.win_rate = win_rate(stats.accepted, stats.total_proposals);
        stats
    }

    /// Stats for every vendor that appears in `proposals`, best win rate first
    pub fn all(proposals: &[Proposal]) -> Vec<Self> {
        let vendors: BTreeSet<&PrincipalId> = proposals.iter().map(|p| &p.vendor_id).collect();
        let mut stats: Vec<Self> = vendors.into_iter().map(|v| Self::for_vendor(v, proposals)).collect();
        stats.sort_by(|a, b| {
            b.win_rate
                .total_cmp(&a.win_rate)
                .then_with(|| b.total_proposals.cmp(&a.total_proposals))
                .then_with(|| a.vendor_id.cmp(&b.vendor_id))
        });
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RfpStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub awaiting_review: usize,
    pub converted: usize,
}

impl RfpStats {
    pub fn compute(rfps: &[RfpRequest]) -> Self {
        let mut by_status = BTreeMap::new();
        for rfp in rfps {
            *by_status.entry(rfp.status.as_str().to_string()).or_insert(0) += 1;
        }
        Self {
            total: rfps.len(),
            by_status,
            awaiting_review: rfps.iter().filter(|r| r.status == RfpStatus::Review).count(),
            converted: rfps.iter().filter(|r| r.converted_to.is_some()).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    pub total_requests: usize,
    pub by_status: BTreeMap<String, usize>,
    pub open_requests: usize,
    pub total_proposals: usize,
    pub avg_proposals_per_request: f64,
    pub avg_proposals_per_request_display: u64,
    pub total_views: u64,
}

impl MarketStats {
    pub fn compute(markets: &[MarketRequest]) -> Self {
        let mut by_status = BTreeMap::new();
        for market in markets {
            *by_status.entry(market.status.as_str().to_string()).or_insert(0) += 1;
        }
        let total_proposals = markets.iter().map(|m| m.proposals.len()).sum();
        Self {
            total_requests: markets.len(),
            by_status,
            open_requests: markets.iter().filter(|m| m.status.is_open()).count(),
            total_proposals,
            avg_proposals_per_request: avg_proposals_per_request(total_proposals, markets.len()),
            avg_proposals_per_request_display: avg_proposals_per_request_display(total_proposals, markets.len()),
            total_views: markets.iter().map(|m| m.views_count).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub active_value: f64,
    pub expiring_soon: usize,
}

impl ContractStats {
    /// `expiry_window_days` decides what counts as expiring soon
    pub fn compute(contracts: &[Contract], now: DateTime<Utc>, expiry_window_days: i64) -> Self {
        let mut by_status = BTreeMap::new();
        for contract in contracts {
            *by_status.entry(contract.status.as_str().to_string()).or_insert(0) += 1;
        }
        let active = || contracts.iter().filter(|c| c.status == ContractStatus::Active);
        Self {
            total: contracts.len(),
            by_status,
            active_value: active().map(|c| c.value).sum(),
            expiring_soon: active()
                .filter(|c| {
                    c.days_until_expiry(now)
                        .is_some_and(|days| (0..=expiry_window_days).contains(&days))
                })
                .count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total_contracts: usize,
    pub audited_contracts: usize,
    pub audit_coverage: f64,
    pub total_audits: usize,
    /// Mean compliance score of each contract's latest audit
    pub average_compliance_score: Option<f64>,
    pub compliance_band: Option<ComplianceBand>,
    pub open_findings_by_severity: BTreeMap<Severity, usize>,
    /// Current risk level of each contract's latest audit
    pub risk_distribution: BTreeMap<Severity, usize>,
}

impl AuditStats {
    pub fn compute(contracts: &[Contract]) -> Self {
        let latest: Vec<_> = contracts.iter().filter_map(|c| c.latest_audit()).collect();

        let average_compliance_score = if latest.is_empty() {
            None
        } else {
            Some(latest.iter().map(|a| a.compliance_score).sum::<f64>() / latest.len() as f64)
        };

        let mut open_findings_by_severity = BTreeMap::new();
        for finding in contracts.iter().flat_map(|c| &c.audits).flat_map(|a| a.unresolved_findings()) {
            *open_findings_by_severity.entry(finding.severity).or_insert(0) += 1;
        }

        let mut risk_distribution = BTreeMap::new();
        for audit in &latest {
            *risk_distribution.entry(audit.current_risk_level()).or_insert(0) += 1;
        }

        Self {
            total_contracts: contracts.len(),
            audited_contracts: latest.len(),
            audit_coverage: audit_coverage(latest.len(), contracts.len()),
            total_audits: contracts.iter().map(|c| c.audits.len()).sum(),
            average_compliance_score,
            compliance_band: average_compliance_score.map(ComplianceBand::from_score),
            open_findings_by_severity,
            risk_distribution,
        }
    }
}

/// Everything a dashboard shows, computed in one pass over a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementDashboard {
    pub generated_at: DateTime<Utc>,
    pub rfps: RfpStats,
    pub markets: MarketStats,
    pub contracts: ContractStats,
    pub audits: AuditStats,
    pub vendors: Vec<VendorStats>,
}

impl ProcurementDashboard {
    pub fn compute(
        rfps: &[RfpRequest],
        markets: &[MarketRequest],
        proposals: &[Proposal],
        contracts: &[Contract],
        now: DateTime<Utc>,
        expiry_window_days: i64,
    ) -> Self {
        Self {
            generated_at: now,
            rfps: RfpStats::compute(rfps),
            markets: MarketStats::compute(markets),
            contracts: ContractStats::compute(contracts, now, expiry_window_days),
            audits: AuditStats::compute(contracts),
            vendors: VendorStats::all(proposals),
        }
    }
}
