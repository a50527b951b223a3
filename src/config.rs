use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::bands::StepTable;
use crate::core::distance::DistanceMethod;
use crate::core::matrices::{CompatibilityMatrices, CompatibilityTable, MatrixEntry};
use crate::core::scoring::ScorerPolicy;
use crate::error::MatchError;
use crate::models::{Community, ReligiosityLevel, ScoringWeights};

/// Engine configuration
///
/// Every field has a default, so an empty configuration is valid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub providers: ProviderSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub ranker: RankerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Only pair profiles from opposite sides
    #[serde(default = "default_partition_sides")]
    pub partition_sides: bool,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Stable matching proposal budget; `|A| x |B|` when unset
    #[serde(default)]
    pub proposal_cap: Option<usize>,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_results: default_max_results(),
            partition_sides: default_partition_sides(),
            worker_threads: default_worker_threads(),
            proposal_cap: None,
        }
    }
}

fn default_min_score() -> f64 { 0.3 }
fn default_max_results() -> usize { 20 }
fn default_partition_sides() -> bool { true }
fn default_worker_threads() -> usize { 4 }

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default = "StepTable::age_gap")]
    pub age_bands: StepTable,
    #[serde(default = "StepTable::distance")]
    pub distance_bands: StepTable,
    #[serde(default = "default_neutral")]
    pub neutral_semantic: f64,
    #[serde(default = "default_neutral")]
    pub neutral_location: f64,
    /// Distance assumed by the filter when a lookup fails
    #[serde(default)]
    pub fallback_distance_km: f64,
    /// Full replacement for the built-in community table
    #[serde(default)]
    pub community_matrix: Option<Vec<MatrixEntry<Community>>>,
    /// Full replacement for the built-in religiosity table
    #[serde(default)]
    pub religiosity_matrix: Option<Vec<MatrixEntry<ReligiosityLevel>>>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weights: WeightsConfig::default(),
            age_bands: StepTable::age_gap(),
            distance_bands: StepTable::distance(),
            neutral_semantic: default_neutral(),
            neutral_location: default_neutral(),
            fallback_distance_km: 0.0,
            community_matrix: None,
            religiosity_matrix: None,
        }
    }
}

fn default_neutral() -> f64 { 0.5 }

impl ScoringSettings {
    pub fn weights(&self) -> Result<ScoringWeights, MatchError> {
        let w = &self.weights;
        ScoringWeights::new(w.semantic, w.religious, w.age, w.location, w.other)
    }

    pub fn policy(&self) -> Result<ScorerPolicy, MatchError> {
        let policy = ScorerPolicy {
            age_bands: self.age_bands.clone(),
            distance_bands: self.distance_bands.clone(),
            neutral_semantic: self.neutral_semantic,
            neutral_location: self.neutral_location,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Built-in tables with any configured replacements applied
    pub fn matrices(&self) -> Result<CompatibilityMatrices, MatchError> {
        let standard = CompatibilityMatrices::standard()?;
        if self.community_matrix.is_none() && self.religiosity_matrix.is_none() {
            return Ok(standard);
        }

        let community = match &self.community_matrix {
            Some(entries) => CompatibilityTable::from_entries("community", entries.iter().copied())?,
            None => standard.community_table().clone(),
        };
        let religiosity = match &self.religiosity_matrix {
            Some(entries) => CompatibilityTable::from_entries("religiosity", entries.iter().copied())?,
            None => standard.religiosity_table().clone(),
        };
        Ok(CompatibilityMatrices::new(community, religiosity))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_semantic_weight")]
    pub semantic: f64,
    #[serde(default = "default_religious_weight")]
    pub religious: f64,
    #[serde(default = "default_age_weight")]
    pub age: f64,
    #[serde(default = "default_location_weight")]
    pub location: f64,
    #[serde(default = "default_other_weight")]
    pub other: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            semantic: default_semantic_weight(),
            religious: default_religious_weight(),
            age: default_age_weight(),
            location: default_location_weight(),
            other: default_other_weight(),
        }
    }
}

fn default_semantic_weight() -> f64 { 0.55 }
fn default_religious_weight() -> f64 { 0.20 }
fn default_age_weight() -> f64 { 0.10 }
fn default_location_weight() -> f64 { 0.10 }
fn default_other_weight() -> f64 { 0.05 }

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_similarity_timeout_ms")]
    pub similarity_timeout_ms: u64,
    #[serde(default = "default_distance_timeout_ms")]
    pub distance_timeout_ms: u64,
    #[serde(default = "default_provider_threads")]
    pub threads: usize,
    /// Distance formula for the built-in gazetteer
    #[serde(default)]
    pub distance_method: DistanceMethod,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            similarity_timeout_ms: default_similarity_timeout_ms(),
            distance_timeout_ms: default_distance_timeout_ms(),
            threads: default_provider_threads(),
            distance_method: DistanceMethod::default(),
        }
    }
}

impl ProviderSettings {
    pub fn similarity_timeout(&self) -> Duration {
        Duration::from_millis(self.similarity_timeout_ms)
    }

    pub fn distance_timeout(&self) -> Duration {
        Duration::from_millis(self.distance_timeout_ms)
    }
}

fn default_similarity_timeout_ms() -> u64 { 2000 }
fn default_distance_timeout_ms() -> u64 { 1000 }
fn default_provider_threads() -> usize { 8 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
    /// Time to live of a cached similarity; entries never expire when unset
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: None,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

fn default_cache_capacity() -> u64 { 10_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct RankerSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_l2")]
    pub l2: f64,
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            l2: default_l2(),
        }
    }
}

fn default_epochs() -> usize { 200 }
fn default_learning_rate() -> f64 { 0.05 }
fn default_l2() -> f64 { 1e-4 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. Defaults in the structs
    /// 2. config/default, then config/local (both optional)
    /// 3. Environment variables, e.g. `MATCH__MATCHING__MIN_SCORE`
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), MatchError> {
        let min_score = self.matching.min_score;
        if !min_score.is_finite() || !(0.0..=1.0).contains(&min_score) {
            return Err(MatchError::Config(format!("matching.min_score {} outside [0, 1]", min_score)));
        }
        if self.matching.worker_threads == 0 {
            return Err(MatchError::Config("matching.worker_threads must be positive".to_string()));
        }
        if !self.scoring.fallback_distance_km.is_finite() || self.scoring.fallback_distance_km < 0.0 {
            return Err(MatchError::Config(
                "scoring.fallback_distance_km must be a non-negative distance".to_string(),
            ));
        }
        self.scoring.weights()?;
        self.scoring.policy()?;
        self.scoring.matrices()?;
        Ok(())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("MATCH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = WeightsConfig::default();
        assert_eq!(weights.semantic, 0.55);
        assert_eq!(weights.religious, 0.20);
        assert_eq!(weights.age, 0.10);
        assert_eq!(weights.location, 0.10);
        assert_eq!(weights.other, 0.05);
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "pretty");
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.matching.min_score, 0.3);
        assert_eq!(settings.matching.max_results, 20);
        assert!(settings.matching.partition_sides);
        assert_eq!(settings.providers.similarity_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_empty_source_uses_defaults() {
        let settings: Settings = Config::builder().build().unwrap().try_deserialize().unwrap();
        assert_eq!(settings.scoring.age_bands, StepTable::age_gap());
        assert_eq!(settings.cache.capacity, 10_000);
    }

    #[test]
    fn test_partial_override() {
        let settings: Settings = Config::builder()
            .set_override("matching.min_score", 0.5)
            .unwrap()
            .set_override("scoring.weights.semantic", 0.45)
            .unwrap()
            .set_override("scoring.weights.religious", 0.30)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.matching.min_score, 0.5);
        assert_eq!(settings.providers.distance_method, DistanceMethod::Geodesic);
        let weights = settings.scoring.weights().unwrap();
        assert_eq!(weights.semantic, 0.45);
        assert_eq!(weights.other, 0.05);
    }

    #[test]
    fn test_distance_method_override() {
        let settings: Settings = Config::builder()
            .set_override("providers.distance_method", "haversine")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.providers.distance_method, DistanceMethod::Haversine);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut settings = Settings::default();
        settings.scoring.weights.semantic = 0.9;
        assert!(matches!(settings.validate(), Err(MatchError::Config(_))));
    }

    #[test]
    fn test_invalid_min_score_rejected() {
        let mut settings = Settings::default();
        settings.matching.min_score = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_matrix_override_must_be_complete() {
        let mut settings = Settings::default();
        settings.scoring.religiosity_matrix = Some(vec![MatrixEntry {
            a: ReligiosityLevel::Strict,
            b: ReligiosityLevel::Strict,
            score: 1.0,
        }]);
        assert!(settings.scoring.matrices().is_err());
    }
}
