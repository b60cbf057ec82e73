use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use super::{load_snapshot, print_json, Command};
use crate::contracts::Contract;
use crate::stats::ComplianceBand;
use crate::types::{ContractId, PrincipalId, Severity};

pub struct RiskCommand {
    pub snapshot: PathBuf,
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRisk {
    pub contract_id: ContractId,
    pub title: String,
    pub vendor_id: PrincipalId,
    pub audits: usize,
    pub last_audit: Option<DateTime<Utc>>,
    pub compliance_score: Option<f64>,
    pub compliance_band: Option<ComplianceBand>,
    /// Derived from the findings still open, not the recorded level
    pub current_risk: Option<Severity>,
    pub unresolved_findings: usize,
}

impl ContractRisk {
    pub fn from_contract(contract: &Contract) -> Self {
        let latest = contract.latest_audit();
        Self {
            contract_id: contract.id.clone(),
            title: contract.title.clone(),
            vendor_id: contract.vendor_id.clone(),
            audits: contract.audits.len(),
            last_audit: latest.map(|a| a.audit_date),
            compliance_score: latest.map(|a| a.compliance_score),
            compliance_band: latest.map(|a| ComplianceBand::from_score(a.compliance_score)),
            current_risk: latest.map(|a| a.current_risk_level()),
            unresolved_findings: latest.map_or(0, |a| a.unresolved_findings().count()),
        }
    }
}

/// Highest current risk first; unaudited contracts last
pub fn rank_by_risk(contracts: &[Contract]) -> Vec<ContractRisk> {
    let mut rows: Vec<ContractRisk> = contracts.iter().map(ContractRisk::from_contract).collect();
    rows.sort_by(|a, b| {
        b.current_risk
            .cmp(&a.current_risk)
            .then(b.unresolved_findings.cmp(&a.unresolved_findings))
            .then(a.contract_id.cmp(&b.contract_id))
    });
    rows
}

impl Command for RiskCommand {
    async fn execute(&self) -> Result<()> {
        let snapshot = load_snapshot(&self.snapshot).await?;
        let rows = rank_by_risk(&snapshot.contracts);

        if self.json {
            return print_json(&rows);
        }

        if rows.is_empty() {
            println!("No contracts in snapshot");
            return Ok(());
        }

        println!("⚠️  Contract risk overview");
        println!();
        for row in &rows {
            let risk = row.current_risk.map_or("unaudited".to_string(), |r| r.to_string());
            let score = row.compliance_score.map_or("-".to_string(), |s| format!("{s:.1}"));
            println!(
                "{:<10} {:<38} compliance {:>5}  open findings {:>2}  {}",
                risk,
                row.contract_id.as_str(),
                score,
                row.unresolved_findings,
                row.title
            );
        }
        Ok(())
    }
}
