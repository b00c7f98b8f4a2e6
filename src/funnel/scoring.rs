//! Propensity scoring: folds an intent into the running score.

use serde::{Deserialize, Serialize};

use crate::funnel::types::Intent;

/// Score deltas per signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Multiplied by `interest_level` when it is positive.
    pub per_interest_point: f64,
    pub meeting_interest: f64,
    pub positive_signal: f64,
    /// Applied as a penalty (subtracted).
    pub trust_concern: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            per_interest_point: 0.1,
            meeting_interest: 0.3,
            positive_signal: 0.2,
            trust_concern: 0.15,
        }
    }
}

/// Pure scoring function over `(previous score, intent)`.
#[derive(Debug, Clone, Default)]
pub struct ScoringModel {
    weights: ScoreWeights,
}

impl ScoringModel {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Signed change this intent contributes.
    pub fn delta(&self, intent: &Intent) -> f64 {
        let mut delta = 0.0;
        if intent.interest_level > 0 {
            delta += f64::from(intent.interest_level) * self.weights.per_interest_point;
        }
        if intent.meeting_interest {
            delta += self.weights.meeting_interest;
        }
        if intent.positive_signal {
            delta += self.weights.positive_signal;
        }
        if intent.trust_concern {
            delta -= self.weights.trust_concern;
        }
        delta
    }

    /// New score, clamped to `[0, 1]`.
    pub fn next_score(&self, prev_score: f64, intent: &Intent) -> f64 {
        clamp_score(sanitize(prev_score) + self.delta(intent))
    }
}

/// Clamp to the valid score range. NaN collapses to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

fn sanitize(score: f64) -> f64 {
    if score.is_finite() { score } else { 0.0 }
}
