use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// One band of a step function: values up to `max` (inclusive) score `score`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub max: f64,
    pub score: f64,
}

/// Monotonically non-increasing step function used as a scoring policy
///
/// Bands are checked in ascending `max` order; anything past the last band
/// scores `otherwise`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTable {
    pub steps: Vec<Step>,
    pub otherwise: f64,
}

impl StepTable {
    pub fn new(steps: Vec<Step>, otherwise: f64) -> Result<Self, MatchError> {
        let table = Self { steps, otherwise };
        table.validate()?;
        Ok(table)
    }

    /// Default age-gap policy (years)
    pub fn age_gap() -> Self {
        Self {
            steps: vec![
                Step { max: 2.0, score: 1.0 },
                Step { max: 5.0, score: 0.8 },
                Step { max: 8.0, score: 0.6 },
                Step { max: 12.0, score: 0.4 },
            ],
            otherwise: 0.2,
        }
    }

    /// Default distance policy (km)
    pub fn distance() -> Self {
        Self {
            steps: vec![
                Step { max: 10.0, score: 1.0 },
                Step { max: 25.0, score: 0.8 },
                Step { max: 50.0, score: 0.6 },
                Step { max: 100.0, score: 0.4 },
            ],
            otherwise: 0.2,
        }
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.otherwise) {
            return Err(MatchError::Config(format!(
                "step table fallback {} outside [0, 1]",
                self.otherwise
            )));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if !in_unit(step.score) || !step.max.is_finite() {
                return Err(MatchError::Config(format!("invalid step {:?}", step)));
            }
            if let Some(next) = self.steps.get(i + 1) {
                if next.max <= step.max {
                    return Err(MatchError::Config(
                        "step bounds must be strictly ascending".to_string(),
                    ));
                }
                if next.score > step.score {
                    return Err(MatchError::Config(
                        "step scores must be non-increasing".to_string(),
                    ));
                }
            }
        }
        if let Some(last) = self.steps.last() {
            if self.otherwise > last.score {
                return Err(MatchError::Config(
                    "step table fallback exceeds the last band".to_string(),
                ));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn lookup(&self, value: f64) -> f64 {
        self.steps
            .iter()
            .find(|step| value <= step.max)
            .map_or(self.otherwise, |step| step.score)
    }
}
