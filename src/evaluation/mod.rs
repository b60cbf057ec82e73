// Evaluation & scoring
//
// Manual review scores, the advisory AI evaluation contract and the ranking
// key used by proposal comparison views. Everything here is a pure function of
// stored proposal data.

pub mod ai;
pub mod ranking;
pub mod scoring;

pub use ai::{AiEvaluation, AiEvaluationError, AiIngestOutcome, PriceAnalysis, RiskAssessment};
pub use ranking::{rank_proposals, ranking_key, RankedProposal, RankingKey};
pub use scoring::{EvaluationScores, Recommendation, ScoreInput, ScoringWeights};
