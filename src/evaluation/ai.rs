// AI evaluation contract
//
// The scoring model lives outside the engine. We only check the shape of what
// it returns and keep it as advisory data on the proposal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Severity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub overall_risk: Severity,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAnalysis {
    #[serde(default)]
    pub competitiveness: Option<String>,
    #[serde(default)]
    pub market_position: Option<String>,
}

/// Output of the external scorer for a single proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiEvaluation {
    pub confidence_score: f64,
    pub risk_assessment: RiskAssessment,
    #[serde(default)]
    pub price_analysis: PriceAnalysis,
}

#[derive(Debug, Error, PartialEq)]
pub enum AiEvaluationError {
    #[error("Malformed AI evaluation payload: {0}")]
    Malformed(String),

    #[error("Confidence score {0} is outside 0-100")]
    ConfidenceOutOfRange(f64),
}

impl AiEvaluation {
    /// Parse and validate a raw payload from the scorer
    pub fn parse(payload: &serde_json::Value) -> Result<Self, AiEvaluationError> {
        let evaluation: AiEvaluation = serde_json::from_value(payload.clone())
            .map_err(|e| AiEvaluationError::Malformed(e.to_string()))?;
        evaluation.validate()?;
        Ok(evaluation)
    }

    pub fn validate(&self) -> Result<(), AiEvaluationError> {
        if !self.confidence_score.is_finite() || !(0.0..=100.0).contains(&self.confidence_score) {
            return Err(AiEvaluationError::ConfidenceOutOfRange(self.confidence_score));
        }
        Ok(())
    }
}

/// Result of handing a scorer payload to a proposal. Malformed data is
/// discarded rather than failing the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum AiIngestOutcome {
    Stored,
    Discarded { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_payload() {
        let payload = json!({
            "confidenceScore": 87.5,
            "riskAssessment": { "overallRisk": "medium", "riskFactors": ["single supplier"] },
            "priceAnalysis": { "competitiveness": "high", "marketPosition": "below median" }
        });
        let evaluation = AiEvaluation::parse(&payload).unwrap();
        assert_eq!(evaluation.confidence_score, 87.5);
        assert_eq!(evaluation.risk_assessment.overall_risk, Severity::Medium);
        assert_eq!(evaluation.price_analysis.market_position.as_deref(), Some("below median"));
    }

    #[test]
    fn test_price_analysis_is_optional() {
        let payload = json!({
            "confidenceScore": 40,
            "riskAssessment": { "overallRisk": "low" }
        });
        let evaluation = AiEvaluation::parse(&payload).unwrap();
        assert!(evaluation.risk_assessment.risk_factors.is_empty());
        assert_eq!(evaluation.price_analysis, PriceAnalysis::default());
    }

    #[test]
    fn test_unknown_risk_level_is_malformed() {
        let payload = json!({
            "confidenceScore": 40,
            "riskAssessment": { "overallRisk": "extreme" }
        });
        assert!(matches!(AiEvaluation::parse(&payload), Err(AiEvaluationError::Malformed(_))));
    }

    #[test]
    fn test_confidence_out_of_range() {
        let payload = json!({
            "confidenceScore": 140,
            "riskAssessment": { "overallRisk": "low" }
        });
        assert_eq!(
            AiEvaluation::parse(&payload),
            Err(AiEvaluationError::ConfidenceOutOfRange(140.0))
        );
    }

    #[test]
    fn test_non_numeric_confidence_is_malformed() {
        let payload = json!({
            "confidenceScore": "very",
            "riskAssessment": { "overallRisk": "low" }
        });
        assert!(matches!(AiEvaluation::parse(&payload), Err(AiEvaluationError::Malformed(_))));
    }
}
