use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MatchError;

/// Allowed deviation of a weight vector's sum from 1.0
pub const WEIGHT_TOLERANCE: f64 = 0.01;

/// Scoring weights
///
/// Only constructible through [`ScoringWeights::new`] (or deserialization
/// followed by [`ScoringWeights::validate`]), so a weight vector in use always
/// sums to 1 within [`WEIGHT_TOLERANCE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub semantic: f64,
    pub religious: f64,
    pub age: f64,
    pub location: f64,
    pub other: f64,
}

impl ScoringWeights {
    pub fn new(
        semantic: f64,
        religious: f64,
        age: f64,
        location: f64,
        other: f64,
    ) -> Result<Self, MatchError> {
        let weights = Self {
            semantic,
            religious,
            age,
            location,
            other,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        let values = self.as_array();
        if values.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(MatchError::Config(format!(
                "weights must be finite and non-negative: {:?}",
                self
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(MatchError::Config(format!(
                "weights must sum to 1.0, got {:.4}",
                sum
            )));
        }
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    fn as_array(&self) -> [f64; 5] {
        [self.semantic, self.religious, self.age, self.location, self.other]
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            semantic: 0.55,
            religious: 0.20,
            age: 0.10,
            location: 0.10,
            other: 0.05,
        }
    }
}

/// Where a pair's total came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Heuristic,
    Learned,
}

/// Directional compatibility score, requester -> candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairScore {
    #[serde(rename = "requesterId")]
    pub requester_id: String,
    #[serde(rename = "candidateId")]
    pub candidate_id: String,
    pub semantic: f64,
    pub religious: f64,
    pub age: f64,
    pub location: f64,
    #[serde(rename = "otherFactors")]
    pub other: f64,
    pub total: f64,
    pub explanation: String,
    pub weights: ScoringWeights,
    pub source: ScoreSource,
}

impl PairScore {
    /// Bare score between two ids, used when scores come from outside the scorer
    pub fn bare(requester_id: impl Into<String>, candidate_id: impl Into<String>, total: f64) -> Self {
        let total = clamp_unit(total);
        Self {
            requester_id: requester_id.into(),
            candidate_id: candidate_id.into(),
            semantic: total,
            religious: total,
            age: total,
            location: total,
            other: total,
            total,
            explanation: Tier::of(total).to_string(),
            weights: ScoringWeights::default(),
            source: ScoreSource::Heuristic,
        }
    }
}

/// Clamp into [0, 1], mapping non-finite values to 0
#[inline]
pub fn clamp_unit(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Textual tier for a [0, 1] score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Weak,
    Fair,
    Good,
    Excellent,
}

impl Tier {
    pub fn of(score: f64) -> Self {
        if score >= 0.8 {
            Tier::Excellent
        } else if score >= 0.6 {
            Tier::Good
        } else if score >= 0.4 {
            Tier::Fair
        } else {
            Tier::Weak
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::Weak => "weak",
            Tier::Fair => "fair",
            Tier::Good => "good",
            Tier::Excellent => "excellent",
        };
        f.write_str(label)
    }
}
