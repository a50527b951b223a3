// Core algorithm exports
pub mod bands;
pub mod distance;
pub mod filters;
pub mod matcher;
pub mod matrices;
pub mod ranker;
pub mod score_table;
pub mod scoring;
pub mod stability;
pub mod stable;

pub use bands::{Step, StepTable};
pub use distance::{geodesic_distance, haversine_distance, Coordinates, DistanceMethod};
pub use filters::{ConstraintFilter, RejectReason, SidePartition};
pub use matcher::{MatchLimits, Matcher, PairFailure, PopulationScores, ScoredBatch};
pub use matrices::{CompatibilityMatrices, CompatibilityTable, MatrixEntry};
pub use ranker::{
    FeatureVector, LearnedScorer, LinearRanker, RankerAdapter, RankerError, TrainingGroup,
    TrainingSummary, FEATURE_NAMES, FEATURE_SCHEMA_VERSION,
};
pub use score_table::{ScoreTable, TieBreak};
pub use scoring::{CompatibilityScorer, ScorerPolicy};
pub use stability::validate_stability;
pub use stable::{compute_stable_matching, StableMatcher};
