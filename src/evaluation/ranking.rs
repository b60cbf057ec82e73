// Comparison ranking for proposals of one market request
//
// Primary order is the manual overall score (descending), then total price
// (ascending), then AI confidence (descending). Missing scores sort last.

use serde::Serialize;
use std::cmp::Ordering;

use crate::proposals::Proposal;
use crate::types::{PrincipalId, ProposalId, Severity};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingKey {
    pub overall: Option<f64>,
    pub total_price: f64,
    pub confidence: Option<f64>,
}

fn descending_some_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl RankingKey {
    /// `Less` means `self` ranks ahead of `other`
    pub fn compare(&self, other: &Self) -> Ordering {
        descending_some_first(self.overall, other.overall)
            .then_with(|| self.total_price.total_cmp(&other.total_price))
            .then_with(|| descending_some_first(self.confidence, other.confidence))
    }
}

pub fn ranking_key(proposal: &Proposal) -> RankingKey {
    RankingKey {
        overall: proposal.evaluation_scores.map(|scores| scores.overall),
        total_price: proposal.total_price,
        confidence: proposal.ai_evaluation.as_ref().map(|ai| ai.confidence_score),
    }
}

/// Row of a comparison view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedProposal {
    pub rank: usize,
    pub proposal_id: ProposalId,
    pub vendor_id: PrincipalId,
    pub overall: Option<f64>,
    pub total_price: f64,
    pub confidence: Option<f64>,
    pub overall_risk: Option<Severity>,
}

/// Rank proposals best first. Ties fall back to the proposal id so the order
/// is stable across calls.
pub fn rank_proposals(proposals: &[Proposal]) -> Vec<RankedProposal> {
    let mut ordered: Vec<(&Proposal, RankingKey)> = proposals.iter().map(|p| (p, ranking_key(p))).collect();
    ordered.sort_by(|(a, ka), (b, kb)| ka.compare(kb).then_with(|| a.id.cmp(&b.id)));

    ordered
        .into_iter()
        .enumerate()
        .map(|(idx, (proposal, key))| RankedProposal {
            rank: idx + 1,
            proposal_id: proposal.id.clone(),
            vendor_id: proposal.vendor_id.clone(),
            overall: key.overall,
            total_price: key.total_price,
            confidence: key.confidence,
            overall_risk: proposal.ai_evaluation.as_ref().map(|ai| ai.risk_assessment.overall_risk),
        })
        .collect()
}
