use std::sync::Arc;

use crate::core::bands::StepTable;
use crate::core::filters::same_location;
use crate::core::matrices::CompatibilityMatrices;
use crate::error::MatchError;
use crate::models::{clamp_unit, PairScore, Preferences, Profile, ScoreSource, ScoringWeights, Tier};
use crate::services::{combine_text, GeoDistance, TextSimilarity};

/// Tunable parts of the heuristic score
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerPolicy {
    pub age_bands: StepTable,
    pub distance_bands: StepTable,
    /// Semantic score used when the similarity provider fails
    pub neutral_semantic: f64,
    /// Location score used when the distance provider fails
    pub neutral_location: f64,
}

impl ScorerPolicy {
    pub fn validate(&self) -> Result<(), MatchError> {
        self.age_bands.validate()?;
        self.distance_bands.validate()?;
        for (name, value) in [
            ("neutral_semantic", self.neutral_semantic),
            ("neutral_location", self.neutral_location),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(MatchError::Config(format!("{} must be in [0, 1], got {}", name, value)));
            }
        }
        Ok(())
    }
}

impl Default for ScorerPolicy {
    fn default() -> Self {
        Self {
            age_bands: StepTable::age_gap(),
            distance_bands: StepTable::distance(),
            neutral_semantic: 0.5,
            neutral_location: 0.5,
        }
    }
}

/// Heuristic multi-factor compatibility score
///
/// total = w_semantic * semantic + w_religious * religious + w_age * age
///       + w_location * location + w_other * other
///
/// Every component is clamped to [0, 1] before combination, so with weights
/// summing to 1 the total stays in [0, 1].
#[derive(Clone)]
pub struct CompatibilityScorer {
    matrices: Arc<CompatibilityMatrices>,
    similarity: Arc<dyn TextSimilarity>,
    distance: Arc<dyn GeoDistance>,
    policy: Arc<ScorerPolicy>,
    weights: ScoringWeights,
}

impl CompatibilityScorer {
    pub fn new(
        matrices: Arc<CompatibilityMatrices>,
        similarity: Arc<dyn TextSimilarity>,
        distance: Arc<dyn GeoDistance>,
        policy: ScorerPolicy,
    ) -> Result<Self, MatchError> {
        policy.validate()?;
        Ok(Self {
            matrices,
            similarity,
            distance,
            policy: Arc::new(policy),
            weights: ScoringWeights::default(),
        })
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Result<Self, MatchError> {
        weights.validate()?;
        self.weights = weights;
        Ok(self)
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score `a -> b` with the scorer's own weights
    pub fn score(
        &self,
        a: &Profile,
        b: &Profile,
        prefs_a: Option<&Preferences>,
        prefs_b: Option<&Preferences>,
    ) -> PairScore {
        self.score_weighted(a, b, prefs_a, prefs_b, &self.weights)
    }

    /// Score `a -> b` with an explicit, already validated, weight vector
    pub fn score_weighted(
        &self,
        a: &Profile,
        b: &Profile,
        prefs_a: Option<&Preferences>,
        prefs_b: Option<&Preferences>,
        weights: &ScoringWeights,
    ) -> PairScore {
        let semantic = self.semantic(a, b, prefs_a, prefs_b);
        let religious = self.religious(a, b);
        let age = self.age(a, b);
        let location = self.location(a, b);
        let other = other_factors(a, b);

        let total = clamp_unit(
            weights.semantic * semantic
                + weights.religious * religious
                + weights.age * age
                + weights.location * location
                + weights.other * other,
        );

        tracing::debug!(
            requester = %a.id,
            candidate = %b.id,
            semantic,
            religious,
            age,
            location,
            other,
            total,
            "Scored pair"
        );

        PairScore {
            requester_id: a.id.clone(),
            candidate_id: b.id.clone(),
            semantic,
            religious,
            age,
            location,
            other,
            total,
            explanation: explain([semantic, religious, age, location, other], total),
            weights: *weights,
            source: ScoreSource::Heuristic,
        }
    }

    /// Similarity of profile description plus free-text preferences
    pub fn semantic(
        &self,
        a: &Profile,
        b: &Profile,
        prefs_a: Option<&Preferences>,
        prefs_b: Option<&Preferences>,
    ) -> f64 {
        let text_a = combine_text(&a.description, prefs_a.map_or("", |p| p.free_text.as_str()));
        let text_b = combine_text(&b.description, prefs_b.map_or("", |p| p.free_text.as_str()));

        match self.similarity.similarity(&text_a, &text_b) {
            Ok(value) => clamp_unit(value),
            Err(e) => {
                tracing::warn!(
                    requester = %a.id,
                    candidate = %b.id,
                    "Similarity unavailable, using neutral score: {}",
                    e
                );
                self.policy.neutral_semantic
            }
        }
    }

    pub fn religious(&self, a: &Profile, b: &Profile) -> f64 {
        clamp_unit(
            self.matrices
                .religious((a.community, b.community), (a.religiosity, b.religiosity)),
        )
    }

    pub fn age(&self, a: &Profile, b: &Profile) -> f64 {
        let gap = (i16::from(a.age) - i16::from(b.age)).abs();
        clamp_unit(self.policy.age_bands.lookup(f64::from(gap)))
    }

    pub fn location(&self, a: &Profile, b: &Profile) -> f64 {
        if same_location(&a.location, &b.location) {
            return 1.0;
        }
        match self.distance.distance_km(&a.location, &b.location) {
            Ok(km) if km.is_finite() && km >= 0.0 => clamp_unit(self.policy.distance_bands.lookup(km)),
            Ok(km) => {
                tracing::warn!(requester = %a.id, candidate = %b.id, km, "Invalid distance");
                self.policy.neutral_location
            }
            Err(e) => {
                tracing::warn!(
                    requester = %a.id,
                    candidate = %b.id,
                    "Distance unavailable, using neutral score: {}",
                    e
                );
                self.policy.neutral_location
            }
        }
    }
}

impl std::fmt::Debug for CompatibilityScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompatibilityScorer")
            .field("policy", &self.policy)
            .field("weights", &self.weights)
            .finish()
    }
}

/// Mean of education, language and smoking agreement
pub fn other_factors(a: &Profile, b: &Profile) -> f64 {
    let education = if a.education == b.education { 1.0 } else { 0.7 };
    let languages = if a.languages.is_empty() {
        0.0
    } else {
        (a.common_languages(b) as f64 / a.languages.len() as f64).min(1.0)
    };
    let smoking = if a.smoking == b.smoking { 1.0 } else { 0.3 };

    clamp_unit((education + languages + smoking) / 3.0)
}

/// Human-readable tier summary of a score
pub fn explain(components: [f64; 5], total: f64) -> String {
    let [semantic, religious, age, location, other] = components;
    format!(
        "{} match: semantic {}, religious {}, age {}, location {}, other {}",
        Tier::of(total),
        Tier::of(semantic),
        Tier::of(religious),
        Tier::of(age),
        Tier::of(location),
        Tier::of(other),
    )
}
