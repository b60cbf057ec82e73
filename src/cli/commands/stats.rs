use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

use super::{load_snapshot, print_json, Command};
use crate::stats::ProcurementDashboard;

pub struct StatsCommand {
    pub snapshot: PathBuf,
    pub as_of: Option<String>,
    pub json: bool,
    pub expiry_window_days: i64,
}

impl StatsCommand {
    fn as_of(&self) -> Result<DateTime<Utc>> {
        match &self.as_of {
            Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("invalid --as-of timestamp '{raw}'"))?
                .with_timezone(&Utc)),
            None => Ok(Utc::now()),
        }
    }
}

impl Command for StatsCommand {
    async fn execute(&self) -> Result<()> {
        let snapshot = load_snapshot(&self.snapshot).await?;
        let dashboard = ProcurementDashboard::compute(
            &snapshot.rfp_requests,
            &snapshot.market_requests,
            &snapshot.proposals,
            &snapshot.contracts,
            self.as_of()?,
            self.expiry_window_days,
        );

        if self.json {
            return print_json(&dashboard);
        }

        println!("📊 Procurement dashboard ({})", dashboard.generated_at.to_rfc3339());
        println!();
        println!("RFP requests:      {} ({} awaiting review, {} converted)",
            dashboard.rfps.total, dashboard.rfps.awaiting_review, dashboard.rfps.converted);
        println!("Market requests:   {} ({} open)", dashboard.markets.total_requests, dashboard.markets.open_requests);
        println!("Proposals:         {} (avg {} per request)",
            dashboard.markets.total_proposals, dashboard.markets.avg_proposals_per_request_display);
        println!("Contracts:         {} ({} expiring soon, active value {:.2})",
            dashboard.contracts.total, dashboard.contracts.expiring_soon, dashboard.contracts.active_value);
        println!("Audit coverage:    {:.0}%", dashboard.audits.audit_coverage);
        match (dashboard.audits.average_compliance_score, dashboard.audits.compliance_band) {
            (Some(score), Some(band)) => println!("Compliance:        {score:.1} ({band})"),
            _ => println!("Compliance:        no audits yet"),
        }

        if !dashboard.vendors.is_empty() {
            println!();
            println!("Vendors:");
            for vendor in &dashboard.vendors {
                println!("  {:<20} {:>3} proposals  win rate {:>5.1}%",
                    vendor.vendor_id.as_str(), vendor.total_proposals, vendor.win_rate * 100.0);
            }
        }
        Ok(())
    }
}
