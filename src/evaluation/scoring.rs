use serde::{Deserialize, Serialize};

use crate::errors::{WorkflowError, WorkflowResult};

/// Relative weights of the manual score components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub technical: f64,
    pub price: f64,
    pub delivery: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            technical: 0.40,
            price: 0.35,
            delivery: 0.25,
        }
    }
}

impl ScoringWeights {
    pub fn new(technical: f64, price: f64, delivery: f64) -> Self {
        Self {
            technical,
            price,
            delivery,
        }
    }

    pub fn total(&self) -> f64 {
        self.technical + self.price + self.delivery
    }

    /// Weights must be finite, non-negative and not all zero
    pub fn validate(&self) -> WorkflowResult<()> {
        let parts = [self.technical, self.price, self.delivery];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(WorkflowError::validation(
                "scoring weights must be finite and non-negative",
            ));
        }
        if self.total() <= 0.0 {
            return Err(WorkflowError::validation("scoring weights must not all be zero"));
        }
        Ok(())
    }

    /// Weighted average normalized by the weight total, so weights do not
    /// have to sum to exactly one.
    pub fn weighted_average(&self, technical: f64, price: f64, delivery: f64) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        (technical * self.technical + price * self.price + delivery * self.delivery) / total
    }
}

/// Reviewer's recommendation recorded alongside the scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Accept,
    Shortlist,
    NeedsClarification,
    Reject,
}

/// Scores as supplied by a reviewer. `overall` is derived when absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreInput {
    pub technical: f64,
    pub price: f64,
    pub delivery: f64,
    #[serde(default)]
    pub overall: Option<f64>,
}

/// Stored evaluation scores, each on a 0-100 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub technical: f64,
    pub price: f64,
    pub delivery: f64,
    pub overall: f64,
}

fn check_score(name: &str, value: f64) -> WorkflowResult<()> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(WorkflowError::Validation {
            message: format!("{name} score must be between 0 and 100, got {value}"),
            fields: vec![name.to_string()],
        })
    }
}

impl EvaluationScores {
    pub fn from_input(input: ScoreInput, weights: &ScoringWeights) -> WorkflowResult<Self> {
        check_score("technical", input.technical)?;
        check_score("price", input.price)?;
        check_score("delivery", input.delivery)?;
        weights.validate()?;

        let overall = match input.overall {
            Some(overall) => {
                check_score("overall", overall)?;
                overall
            }
            None => weights.weighted_average(input.technical, input.price, input.delivery),
        };

        Ok(Self {
            technical: input.technical,
            price: input.price,
            delivery: input.delivery,
            overall,
        })
    }
}
