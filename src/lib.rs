//! Matchmaker - two-sided compatibility matching engine
//!
//! Filters candidates by hard constraints, scores every admissible pair on
//! semantic, religious, age, location and lifestyle factors, optionally
//! re-ranks with a model learned from past outcomes, and assigns the whole
//! population with deferred acceptance.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::config::Settings;
pub use crate::core::{
    compute_stable_matching, validate_stability, CompatibilityMatrices, CompatibilityScorer,
    ConstraintFilter, MatchLimits, Matcher, RankerAdapter, ScoredBatch, StableMatcher, TieBreak,
};
pub use crate::error::MatchError;
pub use crate::models::{
    FeedbackExample, Matching, PairScore, Preferences, Profile, ScoringWeights, Side,
    SideClassifier, StabilityReport,
};
