use anyhow::{bail, Result};
use std::path::PathBuf;

use super::{load_snapshot, print_json, Command};
use crate::evaluation::rank_proposals;
use crate::proposals::ProposalStatus;
use crate::types::MarketRequestId;

pub struct RankCommand {
    pub snapshot: PathBuf,
    pub market: MarketRequestId,
    pub json: bool,
}

impl Command for RankCommand {
    async fn execute(&self) -> Result<()> {
        let snapshot = load_snapshot(&self.snapshot).await?;
        if !snapshot.market_requests.iter().any(|m| m.id == self.market) {
            bail!("market request {} not found in snapshot", self.market);
        }

        let candidates: Vec<_> = snapshot
            .proposals_for(&self.market)
            .into_iter()
            .filter(|p| p.status.is_submitted_or_later() && p.status != ProposalStatus::Withdrawn)
            .collect();
        let ranked = rank_proposals(&candidates);

        if self.json {
            return print_json(&ranked);
        }

        if ranked.is_empty() {
            println!("No submitted proposals for market request {}", self.market);
            return Ok(());
        }

        println!("🏁 Proposal ranking for market request {}", self.market);
        println!();
        for entry in &ranked {
            let overall = entry.overall.map_or("-".to_string(), |s| format!("{s:.1}"));
            let confidence = entry.confidence.map_or("-".to_string(), |c| format!("{c:.0}"));
            println!(
                "{:>2}. {:<38} vendor {:<16} overall {:>5}  price {:>12.2}  confidence {:>3}",
                entry.rank,
                entry.proposal_id.as_str(),
                entry.vendor_id.as_str(),
                overall,
                entry.total_price,
                confidence
            );
        }
        Ok(())
    }
}
