// Property-based checks for the award cascade, the finding status machine,
// proposal ranking and the derived ratios

mod fixtures;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use fixtures::*;
use procurement_workflow::audit::FindingStatus;
use procurement_workflow::award::{plan_award, AwardRequest};
use procurement_workflow::evaluation::{rank_proposals, ranking_key, EvaluationScores};
use procurement_workflow::stats::{audit_coverage, win_rate};
use procurement_workflow::{MarketRequest, Proposal, ProposalStatus};

const REASON: &str = "Contract awarded to another vendor";

fn status_strategy() -> impl Strategy<Value = ProposalStatus> {
    prop_oneof![
        Just(ProposalStatus::Draft),
        Just(ProposalStatus::Submitted),
        Just(ProposalStatus::UnderReview),
        Just(ProposalStatus::Rejected),
        Just(ProposalStatus::Withdrawn),
    ]
}

fn finding_status_strategy() -> impl Strategy<Value = FindingStatus> {
    prop_oneof![
        Just(FindingStatus::Open),
        Just(FindingStatus::Acknowledged),
        Just(FindingStatus::Resolved),
        Just(FindingStatus::Closed),
    ]
}

#[derive(Debug, Clone, Arbitrary)]
struct SiblingSpec {
    #[proptest(strategy = "status_strategy()")]
    status: ProposalStatus,
    #[proptest(strategy = "1u32..=5000")]
    price: u32,
}

#[derive(Debug, Clone, Arbitrary)]
struct ScoredSpec {
    #[proptest(strategy = "proptest::option::of(0u8..=100)")]
    overall: Option<u8>,
    #[proptest(strategy = "1u32..=50")]
    price: u32,
}

fn market() -> MarketRequest {
    let mut market = MarketRequest::create(&officer(), market_draft(), now()).unwrap();
    market.publish(&officer(), now()).unwrap();
    market
}

fn proposal(market: &MarketRequest, index: usize, status: ProposalStatus, price: f64) -> Proposal {
    let ctx = vendor(&format!("v{index}"));
    let mut proposal = Proposal::create(&ctx, market, proposal_draft(price), now()).unwrap();
    proposal.status = status;
    proposal
}

proptest! {
    #[test]
    fn prop_cascade_rejects_exactly_the_live_siblings(siblings in prop::collection::vec(any::<SiblingSpec>(), 0..12)) {
        let market = market();
        let winner = proposal(&market, 0, ProposalStatus::Submitted, 100.0);
        let mut all = vec![winner.clone()];
        all.extend(
            siblings
                .iter()
                .enumerate()
                .map(|(i, s)| proposal(&market, i + 1, s.status, f64::from(s.price))),
        );

        let tx = plan_award(
            &manager(),
            AwardRequest {
                market: &market,
                winner: &winner,
                proposals: &all,
                existing_contract: None,
                manager_notes: None,
                rejection_reason: REASON,
            },
            now(),
        )
        .unwrap();

        let expected = siblings
            .iter()
            .filter(|s| !matches!(s.status, ProposalStatus::Rejected | ProposalStatus::Withdrawn))
            .count();
        prop_assert_eq!(tx.rejected.len(), expected);
        prop_assert_eq!(tx.winner.status, ProposalStatus::Accepted);
        prop_assert!(tx.rejected.iter().all(|p| p.status == ProposalStatus::Rejected));
        prop_assert!(tx.rejected.iter().all(|p| p.rejection_reason.as_deref() == Some(REASON)));
        prop_assert!(tx.rejected.iter().all(|p| p.id != winner.id));
        prop_assert_eq!(tx.new_contract.as_ref().map(|c| c.value), Some(100.0));
        prop_assert_eq!(tx.market.awarded_proposal_id.as_ref(), Some(&winner.id));
    }

    #[test]
    fn prop_finding_machine_never_reopens(from in finding_status_strategy(), to in finding_status_strategy()) {
        let allowed = from.can_transition_to(to);
        if from == FindingStatus::Closed {
            prop_assert!(!allowed);
        }
        if from == FindingStatus::Resolved {
            prop_assert_eq!(allowed, matches!(to, FindingStatus::Resolved | FindingStatus::Closed));
        }
        if to == FindingStatus::Open {
            prop_assert_eq!(allowed, from == FindingStatus::Open);
        }
    }

    #[test]
    fn prop_ranking_is_ordered_and_complete(specs in prop::collection::vec(any::<ScoredSpec>(), 0..10)) {
        let market = market();
        let proposals: Vec<Proposal> = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let mut p = proposal(&market, i, ProposalStatus::UnderReview, f64::from(spec.price));
                p.evaluation_scores = spec.overall.map(|overall| EvaluationScores {
                    technical: 0.0,
                    price: 0.0,
                    delivery: 0.0,
                    overall: f64::from(overall),
                });
                p
            })
            .collect();

        let ranked = rank_proposals(&proposals);
        prop_assert_eq!(ranked.len(), proposals.len());
        for (idx, row) in ranked.iter().enumerate() {
            prop_assert_eq!(row.rank, idx + 1);
        }
        for pair in ranked.windows(2) {
            let a = proposals.iter().find(|p| p.id == pair[0].proposal_id).unwrap();
            let b = proposals.iter().find(|p| p.id == pair[1].proposal_id).unwrap();
            prop_assert_ne!(ranking_key(a).compare(&ranking_key(b)), std::cmp::Ordering::Greater);
        }
        // Scored proposals always precede unscored ones
        if let Some(first_unscored) = ranked.iter().position(|r| r.overall.is_none()) {
            prop_assert!(ranked[first_unscored..].iter().all(|r| r.overall.is_none()));
        }
    }

    #[test]
    fn prop_ratios_stay_in_range(accepted in 0usize..500, total in 0usize..500) {
        let rate = win_rate(accepted, total);
        prop_assert!((0.0..=1.0).contains(&rate));
        let coverage = audit_coverage(accepted, total);
        prop_assert!((0.0..=100.0).contains(&coverage));
        if total == 0 {
            prop_assert_eq!(rate, 0.0);
        }
    }
}
