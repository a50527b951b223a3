//! Optional learned re-ranking.
//!
//! [`RankerAdapter`] wraps an injected [`LearnedScorer`] behind a fixed,
//! named feature schema. Until a model has been fitted (or whenever it fails)
//! predictions fall back to the heuristic total, so callers never need to
//! special-case the untrained state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;
use validator::Validate;

use crate::core::filters::within_age_range;
use crate::models::feedback::MAX_LABEL;
use crate::models::{clamp_unit, FeedbackExample, PairScore, Preferences, Profile};

/// Version tag of [`FEATURE_NAMES`]; bump whenever the list changes
pub const FEATURE_SCHEMA_VERSION: &str = "v1";

pub const FEATURE_NAMES: [&str; 27] = [
    "total_score",
    "semantic",
    "religious",
    "age",
    "location",
    "other_factors",
    "age_diff",
    "age_a",
    "age_b",
    "same_community",
    "same_religiosity",
    "same_education",
    "same_smoking",
    "common_languages_count",
    "language_overlap_ratio",
    "description_length_a",
    "description_length_b",
    "preferences_length_a",
    "preferences_length_b",
    "age_in_range_a",
    "age_in_range_b",
    "community_match_a",
    "community_match_b",
    "religiosity_match_a",
    "religiosity_match_b",
    "education_preferred_a",
    "education_preferred_b",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

#[derive(Debug, Clone, Error)]
pub enum RankerError {
    #[error("Ranker has not been trained")]
    NotTrained,

    #[error("No usable training data: every requester group has fewer than two examples")]
    NoTrainingData,

    #[error("Feature vector has {got} values, schema expects {expected}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("Model error: {0}")]
    Model(String),
}

/// Pair features in schema order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Features of the pair `a -> b` given the heuristic score of that pair
    pub fn extract(
        a: &Profile,
        b: &Profile,
        prefs_a: Option<&Preferences>,
        prefs_b: Option<&Preferences>,
        base: &PairScore,
    ) -> Self {
        let flag = |cond: bool| if cond { 1.0 } else { 0.0 };
        let common = a.common_languages(b) as f64;
        let words = |text: &str| text.split_whitespace().count() as f64;
        let free_text = |prefs: Option<&Preferences>| prefs.map_or(0.0, |p| words(&p.free_text));

        let values = vec![
            base.total,
            base.semantic,
            base.religious,
            base.age,
            base.location,
            base.other,
            (f64::from(a.age) - f64::from(b.age)).abs(),
            f64::from(a.age),
            f64::from(b.age),
            flag(a.community == b.community),
            flag(a.religiosity == b.religiosity),
            flag(a.education == b.education),
            flag(a.smoking == b.smoking),
            common,
            common / a.languages.len().max(1) as f64,
            words(&a.description),
            words(&b.description),
            free_text(prefs_a),
            free_text(prefs_b),
            age_in_range(prefs_a, b),
            age_in_range(prefs_b, a),
            community_match(prefs_a, b),
            community_match(prefs_b, a),
            religiosity_match(prefs_a, b),
            religiosity_match(prefs_b, a),
            education_preferred(prefs_a, b),
            education_preferred(prefs_b, a),
        ];
        Self { values }
    }

    pub fn from_values(values: Vec<f64>) -> Result<Self, RankerError> {
        if values.len() != FEATURE_COUNT {
            return Err(RankerError::FeatureMismatch {
                expected: FEATURE_COUNT,
                got: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.values.get(i).copied())
    }

    pub fn named(&self) -> BTreeMap<&'static str, f64> {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied()).collect()
    }
}

// Preference-satisfaction indicators: 1 satisfied, 0 violated, 0.5 unset.

fn age_in_range(prefs: Option<&Preferences>, other: &Profile) -> f64 {
    match prefs.map(|p| &p.constraints) {
        Some(c) if c.min_age.is_some() || c.max_age.is_some() => {
            if within_age_range(other.age, c) {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.5,
    }
}

fn community_match(prefs: Option<&Preferences>, other: &Profile) -> f64 {
    match prefs.and_then(|p| p.constraints.allowed_communities()) {
        Some(allowed) if allowed.contains(&other.community) => 1.0,
        Some(_) => 0.0,
        None => 0.5,
    }
}

fn religiosity_match(prefs: Option<&Preferences>, other: &Profile) -> f64 {
    match prefs.and_then(|p| p.constraints.allowed_religiosity()) {
        Some(allowed) if allowed.contains(&other.religiosity) => 1.0,
        Some(_) => 0.0,
        None => 0.5,
    }
}

fn education_preferred(prefs: Option<&Preferences>, other: &Profile) -> f64 {
    match prefs.and_then(|p| p.soft.education.as_ref().filter(|set| !set.is_empty())) {
        Some(preferred) if preferred.contains(&other.education) => 1.0,
        Some(_) => 0.0,
        None => 0.5,
    }
}

/// Labelled examples of a single requester
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingGroup {
    pub requester_id: String,
    pub features: Vec<FeatureVector>,
    pub labels: Vec<f64>,
}

impl TrainingGroup {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// A listwise ranking model
///
/// `fit` must be atomic: on error the model keeps whatever state it had.
/// `predict_raw` returns a value on the label scale [0, `MAX_LABEL`].
pub trait LearnedScorer: Send + Sync {
    fn fit(&mut self, groups: &[TrainingGroup]) -> Result<(), RankerError>;

    fn predict_raw(&self, features: &FeatureVector) -> Result<f64, RankerError>;

    /// Unnormalized importance per feature, in schema order
    fn feature_importance(&self) -> Result<Vec<f64>, RankerError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub examples: usize,
    pub groups: usize,
    pub discarded_groups: usize,
    /// Feedback rows that failed validation and never reached a group
    pub invalid_examples: usize,
}

/// Feedback grouped by requester, in id order
pub fn group_feedback<'a, I>(feedback: I) -> BTreeMap<&'a str, Vec<&'a FeedbackExample>>
where
    I: IntoIterator<Item = &'a FeedbackExample>,
{
    let mut groups: BTreeMap<&str, Vec<&FeedbackExample>> = BTreeMap::new();
    for example in feedback {
        groups
            .entry(example.requester_id.as_str())
            .or_default()
            .push(example);
    }
    groups
}

struct RankerState {
    model: Box<dyn LearnedScorer>,
    trained: bool,
}

/// Capability wrapper around a learned scorer with a heuristic fallback
pub struct RankerAdapter {
    state: RwLock<RankerState>,
}

impl RankerAdapter {
    pub fn new(model: Box<dyn LearnedScorer>) -> Self {
        Self {
            state: RwLock::new(RankerState {
                model,
                trained: false,
            }),
        }
    }

    pub fn is_trained(&self) -> bool {
        self.state.read().map(|s| s.trained).unwrap_or(false)
    }

    /// Fit the model on listwise groups built from `feedback`
    ///
    /// `extract` turns an example into features; examples it cannot describe
    /// (unknown ids) return `None` and are skipped. Groups left with fewer
    /// than two examples are discarded.
    pub fn train<F>(&self, feedback: &[FeedbackExample], extract: F) -> Result<TrainingSummary, RankerError>
    where
        F: Fn(&FeedbackExample) -> Option<FeatureVector>,
    {
        let mut invalid_examples = 0;
        let valid = feedback.iter().filter(|example| match example.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    requester = %example.requester_id,
                    candidate = %example.candidate_id,
                    "Skipping invalid feedback: {}",
                    e
                );
                invalid_examples += 1;
                false
            }
        });

        let mut groups = Vec::new();
        let mut discarded_groups = 0;

        for (requester_id, examples) in group_feedback(valid) {
            let mut group = TrainingGroup {
                requester_id: requester_id.to_string(),
                features: Vec::with_capacity(examples.len()),
                labels: Vec::with_capacity(examples.len()),
            };
            for example in examples {
                if let Some(features) = extract(example) {
                    group.features.push(features);
                    group.labels.push(example.status.label());
                }
            }
            if group.len() >= 2 {
                groups.push(group);
            } else {
                discarded_groups += 1;
            }
        }

        if groups.is_empty() {
            return Err(RankerError::NoTrainingData);
        }

        let summary = TrainingSummary {
            examples: groups.iter().map(TrainingGroup::len).sum(),
            groups: groups.len(),
            discarded_groups,
            invalid_examples,
        };
        if summary.examples < 10 {
            tracing::warn!(examples = summary.examples, "Very little training data, ranker may be unreliable");
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| RankerError::Model("ranker state poisoned".to_string()))?;
        state.model.fit(&groups)?;
        state.trained = true;

        tracing::info!(
            examples = summary.examples,
            groups = summary.groups,
            discarded = summary.discarded_groups,
            invalid = summary.invalid_examples,
            schema = FEATURE_SCHEMA_VERSION,
            "Ranker trained"
        );
        Ok(summary)
    }

    /// Learned score in [0, 1]
    pub fn try_predict(&self, features: &FeatureVector) -> Result<f64, RankerError> {
        let state = self
            .state
            .read()
            .map_err(|_| RankerError::Model("ranker state poisoned".to_string()))?;
        if !state.trained {
            return Err(RankerError::NotTrained);
        }
        let raw = state.model.predict_raw(features)?;
        if !raw.is_finite() {
            return Err(RankerError::Model(format!("non-finite prediction {}", raw)));
        }
        Ok(clamp_unit(raw / MAX_LABEL))
    }

    /// Learned score, or `base_total` when no usable prediction exists
    pub fn predict(&self, features: &FeatureVector, base_total: f64) -> f64 {
        match self.try_predict(features) {
            Ok(score) => score,
            Err(RankerError::NotTrained) => base_total,
            Err(e) => {
                tracing::warn!("Ranker prediction failed, keeping base score: {}", e);
                base_total
            }
        }
    }

    /// Importance per feature name, normalized to sum to 100; empty when
    /// untrained
    pub fn feature_importance(&self) -> BTreeMap<String, f64> {
        let Ok(state) = self.state.read() else {
            return BTreeMap::new();
        };
        if !state.trained {
            return BTreeMap::new();
        }
        let raw = match state.model.feature_importance() {
            Ok(raw) if raw.len() == FEATURE_COUNT => raw,
            Ok(raw) => {
                tracing::warn!(got = raw.len(), "Feature importance does not match schema");
                return BTreeMap::new();
            }
            Err(e) => {
                tracing::warn!("Feature importance unavailable: {}", e);
                return BTreeMap::new();
            }
        };

        let magnitudes: Vec<f64> = raw
            .iter()
            .map(|v| if v.is_finite() { v.abs() } else { 0.0 })
            .collect();
        let sum: f64 = magnitudes.iter().sum();
        FEATURE_NAMES
            .iter()
            .zip(magnitudes)
            .map(|(name, m)| {
                let share = if sum > 0.0 {
                    m / sum * 100.0
                } else {
                    100.0 / FEATURE_COUNT as f64
                };
                (name.to_string(), share)
            })
            .collect()
    }
}

impl std::fmt::Debug for RankerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankerAdapter")
            .field("trained", &self.is_trained())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LinearModel {
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

/// Pairwise logistic ranker over standardized features
///
/// For every pair of examples in a group with different labels the model is
/// pushed to score the better one higher. Training visits groups and pairs
/// in a fixed order, so a fit is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRanker {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    model: Option<LinearModel>,
}

impl LinearRanker {
    pub fn new(epochs: usize, learning_rate: f64, l2: f64) -> Self {
        Self {
            epochs,
            learning_rate,
            l2,
            model: None,
        }
    }
}

impl Default for LinearRanker {
    fn default() -> Self {
        Self::new(200, 0.05, 1e-4)
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl LinearModel {
    fn standardize(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (mean, scale))| (v - mean) / scale)
            .collect()
    }
}

impl LearnedScorer for LinearRanker {
    fn fit(&mut self, groups: &[TrainingGroup]) -> Result<(), RankerError> {
        let rows: Vec<&[f64]> = groups
            .iter()
            .flat_map(|g| g.features.iter().map(FeatureVector::values))
            .collect();
        if rows.is_empty() {
            return Err(RankerError::NoTrainingData);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != FEATURE_COUNT) {
            return Err(RankerError::FeatureMismatch {
                expected: FEATURE_COUNT,
                got: bad.len(),
            });
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; FEATURE_COUNT];
        for row in &rows {
            for (m, v) in means.iter_mut().zip(row.iter()) {
                *m += v / n;
            }
        }
        let mut scales = vec![0.0; FEATURE_COUNT];
        for row in &rows {
            for ((s, v), m) in scales.iter_mut().zip(row.iter()).zip(&means) {
                *s += (v - m).powi(2) / n;
            }
        }
        for s in scales.iter_mut() {
            *s = s.sqrt();
            if *s < 1e-12 {
                *s = 1.0;
            }
        }

        let mut model = LinearModel {
            means,
            scales,
            weights: vec![0.0; FEATURE_COUNT],
            bias: 0.0,
        };

        let standardized: Vec<Vec<Vec<f64>>> = groups
            .iter()
            .map(|g| g.features.iter().map(|f| model.standardize(f.values())).collect())
            .collect();

        for _ in 0..self.epochs {
            for (group, rows) in groups.iter().zip(&standardized) {
                for i in 0..group.len() {
                    for j in 0..group.len() {
                        if group.labels[i] <= group.labels[j] {
                            continue;
                        }
                        let diff: Vec<f64> = rows[i].iter().zip(&rows[j]).map(|(x, y)| x - y).collect();
                        let step = 1.0 - sigmoid(dot(&model.weights, &diff));
                        for (w, d) in model.weights.iter_mut().zip(&diff) {
                            *w += self.learning_rate * (step * d - self.l2 * *w);
                        }
                    }
                }
            }
        }

        let labels: Vec<f64> = groups.iter().flat_map(|g| g.labels.iter().copied()).collect();
        let mean_label = labels.iter().sum::<f64>() / labels.len() as f64;
        let p = (mean_label / MAX_LABEL).clamp(0.01, 0.99);
        model.bias = (p / (1.0 - p)).ln();

        if model.weights.iter().any(|w| !w.is_finite()) {
            return Err(RankerError::Model("training diverged".to_string()));
        }
        self.model = Some(model);
        Ok(())
    }

    fn predict_raw(&self, features: &FeatureVector) -> Result<f64, RankerError> {
        let model = self.model.as_ref().ok_or(RankerError::NotTrained)?;
        if features.values().len() != FEATURE_COUNT {
            return Err(RankerError::FeatureMismatch {
                expected: FEATURE_COUNT,
                got: features.values().len(),
            });
        }
        let z = model.standardize(features.values());
        Ok(MAX_LABEL * sigmoid(model.bias + dot(&model.weights, &z)))
    }

    fn feature_importance(&self) -> Result<Vec<f64>, RankerError> {
        let model = self.model.as_ref().ok_or(RankerError::NotTrained)?;
        Ok(model.weights.iter().map(|w| w.abs()).collect())
    }
}
