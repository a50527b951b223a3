// Model exports
pub mod domain;
pub mod feedback;
pub mod matching;
pub mod score;

pub use domain::{
    Community, EducationLevel, Gender, HardConstraints, MaritalStatus, Preferences, Profile,
    ReligiosityLevel, SoftPreferences,
};
pub use feedback::{FeedbackExample, FeedbackStatus};
pub use matching::{BlockingPair, Matching, ProfileSides, Side, SideClassifier, StabilityReport};
pub use score::{clamp_unit, PairScore, ScoreSource, ScoringWeights, Tier};
