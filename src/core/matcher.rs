use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use crate::config::Settings;
use crate::core::filters::{ConstraintFilter, RejectReason, SidePartition};
use crate::core::ranker::{FeatureVector, LinearRanker, RankerAdapter, RankerError, TrainingSummary};
use crate::core::scoring::{explain, CompatibilityScorer};
use crate::core::stable::StableMatcher;
use crate::error::MatchError;
use crate::models::{
    FeedbackExample, Matching, PairScore, Preferences, Profile, ProfileSides, ScoreSource,
    ScoringWeights, Side,
};
use crate::services::{
    provider_pool, CacheStats, CachedSimilarity, Deadline, GeoDistance, PreferenceIndex,
    ProfileRepository, TextSimilarity,
};

/// Result-list limits applied to every ranked list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchLimits {
    pub min_score: f64,
    pub max_results: usize,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self {
            min_score: 0.3,
            max_results: 20,
        }
    }
}

/// A candidate that could not be evaluated
#[derive(Debug, Clone, Serialize)]
pub struct PairFailure {
    #[serde(rename = "requesterId")]
    pub requester_id: String,
    #[serde(rename = "candidateId")]
    pub candidate_id: String,
    pub reason: String,
}

/// Ranked candidates of one requester
#[derive(Debug, Clone, Serialize)]
pub struct ScoredBatch {
    #[serde(rename = "requesterId")]
    pub requester_id: String,
    pub matches: Vec<PairScore>,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    /// Candidates removed by hard constraints
    pub rejected: usize,
    pub failures: Vec<PairFailure>,
}

/// Scores of a whole population, one batch per requester
#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulationScores {
    pub batches: Vec<ScoredBatch>,
    /// Requesters that could not be scored at all
    pub failures: Vec<PairFailure>,
}

impl PopulationScores {
    pub fn scores(&self) -> Vec<PairScore> {
        self.batches
            .iter()
            .flat_map(|batch| batch.matches.iter().cloned())
            .collect()
    }
}

enum Outcome {
    Scored(PairScore),
    Rejected(RejectReason),
    Failed(PairFailure),
}

/// Main matching orchestrator
///
/// # Pipeline Stages
/// 1. Hard-constraint filtering (self, side, age, distance, lifestyle)
/// 2. Heuristic scoring
/// 3. Optional learned re-ranking
/// 4. Threshold, sort and truncate
///
/// Per-requester candidate evaluation and cross-requester population scoring
/// run on the matcher's own bounded worker pool.
#[derive(Clone)]
pub struct Matcher {
    filter: ConstraintFilter,
    scorer: CompatibilityScorer,
    ranker: Option<Arc<RankerAdapter>>,
    stable: StableMatcher,
    pool: Arc<ThreadPool>,
    limits: MatchLimits,
    cache: Option<Arc<CachedSimilarity<dyn TextSimilarity>>>,
}

impl Matcher {
    pub fn new(filter: ConstraintFilter, scorer: CompatibilityScorer, pool: Arc<ThreadPool>) -> Self {
        let limits = MatchLimits::default();
        Self {
            filter,
            scorer,
            ranker: None,
            stable: StableMatcher::new(limits.min_score),
            pool,
            limits,
            cache: None,
        }
    }

    /// Wire a matcher from configuration
    ///
    /// Both providers are bounded by their configured timeouts; similarity
    /// results are cached.
    ///
    /// # Arguments
    /// * `settings` - Validated application settings
    /// * `similarity` - Text-similarity provider for descriptions
    /// * `distance` - Distance provider for profile locations
    ///
    /// # Returns
    /// A matcher with its own worker pool, or a config error
    pub fn from_settings(
        settings: &Settings,
        similarity: Arc<dyn TextSimilarity>,
        distance: Arc<dyn GeoDistance>,
    ) -> Result<Self, MatchError> {
        settings.validate()?;

        let providers = provider_pool(settings.providers.threads)?;
        let similarity: Arc<dyn TextSimilarity> = Arc::new(Deadline::new(
            similarity,
            settings.providers.similarity_timeout(),
            Arc::clone(&providers),
        ));
        let cache: Arc<CachedSimilarity<dyn TextSimilarity>> = Arc::new(CachedSimilarity::new(
            similarity,
            settings.cache.capacity,
            settings.cache.ttl(),
        ));
        let distance: Arc<dyn GeoDistance> = Arc::new(Deadline::new(
            distance,
            settings.providers.distance_timeout(),
            providers,
        ));

        let partition: Option<SidePartition> = if settings.matching.partition_sides {
            Some(Arc::new(|p: &Profile| Side::of_gender(p.gender)))
        } else {
            None
        };
        let filter = ConstraintFilter::new(Arc::clone(&distance))
            .with_fallback_distance(settings.scoring.fallback_distance_km)
            .with_partition(partition);

        let scorer = CompatibilityScorer::new(
            Arc::new(settings.scoring.matrices()?),
            cache.clone(),
            distance,
            settings.scoring.policy()?,
        )?
        .with_weights(settings.scoring.weights()?)?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.matching.worker_threads)
            .thread_name(|i| format!("matcher-{}", i))
            .build()?;

        let limits = MatchLimits {
            min_score: settings.matching.min_score,
            max_results: settings.matching.max_results,
        };
        let mut stable = StableMatcher::new(limits.min_score);
        if let Some(cap) = settings.matching.proposal_cap {
            stable = stable.with_proposal_cap(cap);
        }

        let ranker = settings.ranker.enabled.then(|| {
            let model = LinearRanker::new(
                settings.ranker.epochs,
                settings.ranker.learning_rate,
                settings.ranker.l2,
            );
            Arc::new(RankerAdapter::new(Box::new(model)))
        });

        tracing::info!(
            workers = settings.matching.worker_threads,
            min_score = limits.min_score,
            max_results = limits.max_results,
            ranker = ranker.is_some(),
            "Matcher initialized with weights: {:?}",
            scorer.weights()
        );

        Ok(Self {
            filter,
            scorer,
            ranker,
            stable,
            pool: Arc::new(pool),
            limits,
            cache: Some(cache),
        })
    }

    pub fn with_ranker(mut self, ranker: Arc<RankerAdapter>) -> Self {
        self.ranker = Some(ranker);
        self
    }

    pub fn with_limits(mut self, limits: MatchLimits) -> Self {
        self.limits = limits;
        self.stable = StableMatcher::new(limits.min_score);
        self
    }

    pub fn with_stable_matcher(mut self, stable: StableMatcher) -> Self {
        self.stable = stable;
        self
    }

    pub fn limits(&self) -> MatchLimits {
        self.limits
    }

    pub fn ranker(&self) -> Option<&Arc<RankerAdapter>> {
        self.ranker.as_ref()
    }

    pub fn filter(&self) -> &ConstraintFilter {
        &self.filter
    }

    pub fn scorer(&self) -> &CompatibilityScorer {
        &self.scorer
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    /// Filter, score and rank every candidate in `pool` for one requester
    ///
    /// Fails only when the requester itself is unusable; candidate problems
    /// are collected in the batch.
    ///
    /// # Arguments
    /// * `requester_id` - Profile the list is built for; must be in `pool`
    /// * `pool` - Every candidate profile
    /// * `preferences` - Lookup for the requester's hard constraints
    /// * `weights` - Component weights for the heuristic total
    ///
    /// # Returns
    /// ScoredBatch with ranked matches, rejections and candidate failures
    pub fn filter_and_score(
        &self,
        requester_id: &str,
        pool: &[Profile],
        preferences: &dyn PreferenceIndex,
        weights: &ScoringWeights,
    ) -> Result<ScoredBatch, MatchError> {
        weights.validate()?;
        let requester = pool
            .iter()
            .find(|p| p.id == requester_id)
            .ok_or_else(|| MatchError::input(requester_id, "requester not in candidate pool"))?;

        self.score_requester(requester, pool, preferences, weights)
    }

    fn score_requester(
        &self,
        requester: &Profile,
        pool: &[Profile],
        preferences: &dyn PreferenceIndex,
        weights: &ScoringWeights,
    ) -> Result<ScoredBatch, MatchError> {
        requester
            .validate()
            .map_err(|e| MatchError::input(&requester.id, e.to_string()))?;

        let unrestricted;
        let requester_prefs = match preferences.preferences_for(&requester.id) {
            Some(prefs) => prefs,
            None => {
                tracing::debug!(requester = %requester.id, "No preferences on record, using unrestricted");
                unrestricted = Preferences::unrestricted(requester.id.as_str());
                &unrestricted
            }
        };
        requester_prefs
            .validate()
            .map_err(|e| MatchError::input(&requester.id, e.to_string()))?;

        let outcomes: Vec<Outcome> = self.pool.install(|| {
            pool.par_iter()
                .map(|candidate| self.evaluate(requester, requester_prefs, candidate, preferences, weights))
                .collect()
        });

        let mut matches = Vec::new();
        let mut failures = Vec::new();
        let mut rejected = 0;
        for outcome in outcomes {
            match outcome {
                Outcome::Scored(score) if score.total >= self.limits.min_score => matches.push(score),
                Outcome::Scored(_) => {}
                Outcome::Rejected(RejectReason::SelfMatch) => {}
                Outcome::Rejected(_) => rejected += 1,
                Outcome::Failed(failure) => failures.push(failure),
            }
        }

        // Sort by score (descending) and then by id
        matches.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });
        matches.truncate(self.limits.max_results);

        tracing::info!(
            requester = %requester.id,
            candidates = pool.len(),
            rejected,
            failures = failures.len(),
            matches = matches.len(),
            "Scored candidate batch"
        );

        Ok(ScoredBatch {
            requester_id: requester.id.clone(),
            matches,
            total_candidates: pool.len().saturating_sub(1),
            rejected,
            failures,
        })
    }

    fn evaluate(
        &self,
        requester: &Profile,
        requester_prefs: &Preferences,
        candidate: &Profile,
        preferences: &dyn PreferenceIndex,
        weights: &ScoringWeights,
    ) -> Outcome {
        // self and same side are plain rejections, whatever the candidate's state
        if let Err(reason) = self.filter.counterpart(candidate, requester) {
            return Outcome::Rejected(reason);
        }
        if let Err(e) = candidate.validate() {
            return Outcome::Failed(PairFailure {
                requester_id: requester.id.clone(),
                candidate_id: candidate.id.clone(),
                reason: e.to_string(),
            });
        }
        if let Err(reason) = self.filter.eligible(candidate, requester, &requester_prefs.constraints) {
            return Outcome::Rejected(reason);
        }

        let candidate_prefs = preferences.preferences_for(&candidate.id);
        let mut score = self.scorer.score_weighted(
            requester,
            candidate,
            Some(requester_prefs),
            candidate_prefs,
            weights,
        );
        self.rerank(&mut score, requester, candidate, Some(requester_prefs), candidate_prefs);
        Outcome::Scored(score)
    }

    fn rerank(
        &self,
        score: &mut PairScore,
        a: &Profile,
        b: &Profile,
        prefs_a: Option<&Preferences>,
        prefs_b: Option<&Preferences>,
    ) {
        let Some(ranker) = &self.ranker else {
            return;
        };
        let features = FeatureVector::extract(a, b, prefs_a, prefs_b, score);
        match ranker.try_predict(&features) {
            Ok(total) => {
                score.total = total;
                score.source = ScoreSource::Learned;
                score.explanation = explain(
                    [score.semantic, score.religious, score.age, score.location, score.other],
                    total,
                );
            }
            Err(RankerError::NotTrained) => {}
            Err(e) => tracing::warn!(
                requester = %a.id,
                candidate = %b.id,
                "Ranker prediction failed, keeping heuristic score: {}",
                e
            ),
        }
    }

    /// Ranked lists for every profile in `profiles`, each scored against the
    /// whole population
    ///
    /// # Arguments
    /// * `profiles` - The whole population; every profile is a requester
    /// * `preferences` - Lookup for each requester's hard constraints
    /// * `weights` - Component weights for the heuristic total
    ///
    /// # Returns
    /// PopulationScores with one batch per usable requester
    pub fn score_population(
        &self,
        profiles: &[Profile],
        preferences: &dyn PreferenceIndex,
        weights: &ScoringWeights,
    ) -> Result<PopulationScores, MatchError> {
        weights.validate()?;

        let results: Vec<Result<ScoredBatch, (String, MatchError)>> = self.pool.install(|| {
            profiles
                .par_iter()
                .map(|requester| {
                    self.score_requester(requester, profiles, preferences, weights)
                        .map_err(|e| (requester.id.clone(), e))
                })
                .collect()
        });

        let mut population = PopulationScores::default();
        for result in results {
            match result {
                Ok(batch) => population.batches.push(batch),
                Err((requester_id, e)) => {
                    tracing::warn!(requester = %requester_id, "Requester skipped: {}", e);
                    population.failures.push(PairFailure {
                        candidate_id: requester_id.clone(),
                        requester_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            requesters = profiles.len(),
            batches = population.batches.len(),
            failures = population.failures.len(),
            "Scored population"
        );
        Ok(population)
    }

    /// Population scoring followed by a stable assignment
    ///
    /// # Arguments
    /// * `profiles` - The whole population, split into sides by gender
    /// * `preferences` - Lookup for each requester's hard constraints
    /// * `weights` - Component weights for the heuristic total
    ///
    /// # Returns
    /// The matching, listing every profile, and the scores it was built from
    pub fn stable_matching(
        &self,
        profiles: &[Profile],
        preferences: &dyn PreferenceIndex,
        weights: &ScoringWeights,
    ) -> Result<(Matching, PopulationScores), MatchError> {
        let population = self.score_population(profiles, preferences, weights)?;
        let sides = ProfileSides::from_profiles(profiles, |p| {
            self.filter.side_of(p).unwrap_or_else(|| Side::of_gender(p.gender))
        });
        let mut matching = self.stable.compute(&population.scores(), &sides);
        matching.complete_roster(&sides);
        Ok((matching, population))
    }

    /// Train the configured ranker from historical outcomes
    ///
    /// Each feedback pair is scored by the heuristic scorer first; pairs with
    /// an unknown profile or an invalid rating are skipped.
    ///
    /// # Arguments
    /// * `repository` - Source of the profiles named in the feedback
    /// * `feedback` - Historical outcomes, one per pair
    ///
    /// # Returns
    /// TrainingSummary with example, group and invalid-row counts
    pub fn train_ranker<R>(
        &self,
        repository: &R,
        feedback: &[FeedbackExample],
    ) -> Result<TrainingSummary, MatchError>
    where
        R: ProfileRepository + ?Sized,
    {
        let ranker = self
            .ranker
            .as_ref()
            .ok_or_else(|| MatchError::Config("no ranker configured".to_string()))?;

        let by_id: HashMap<&str, &Profile> = repository
            .profiles()
            .iter()
            .map(|p| (p.id.as_str(), p))
            .collect();

        let extract = |example: &FeedbackExample| -> Option<FeatureVector> {
            let a = by_id.get(example.requester_id.as_str())?;
            let b = by_id.get(example.candidate_id.as_str())?;
            let prefs_a = repository.preferences_for(&a.id);
            let prefs_b = repository.preferences_for(&b.id);
            let base = self.scorer.score(a, b, prefs_a, prefs_b);
            Some(FeatureVector::extract(a, b, prefs_a, prefs_b, &base))
        };

        ranker.train(feedback, extract).map_err(|e| match e {
            RankerError::NoTrainingData => MatchError::input("feedback", e.to_string()),
            other => MatchError::Ranker(other),
        })
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("filter", &self.filter)
            .field("scorer", &self.scorer)
            .field("ranker", &self.ranker)
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::default_languages;
    use crate::models::{
        Community, EducationLevel, FeedbackStatus, Gender, HardConstraints, MaritalStatus,
        ReligiosityLevel,
    };
    use crate::services::{FixedSimilarity, Gazetteer, InMemoryRepository};
    use std::collections::BTreeMap;

    fn create_candidate(id: &str, gender: Gender, age: u8, location: &str) -> Profile {
        Profile {
            id: id.to_string(),
            gender,
            age,
            marital_status: MaritalStatus::Single,
            community: Community::Lithuanian,
            religiosity: ReligiosityLevel::Strict,
            location: location.to_string(),
            education: EducationLevel::Yeshiva,
            occupation: None,
            description: String::new(),
            languages: default_languages(),
            smoking: false,
        }
    }

    fn gazetteer() -> Arc<Gazetteer> {
        let table = BTreeMap::from([
            ("Jerusalem".to_string(), [31.7683, 35.2137]),
            ("Beit Shemesh".to_string(), [31.7470, 34.9881]),
            ("Haifa".to_string(), [32.7940, 34.9896]),
        ]);
        Arc::new(Gazetteer::from_table(&table).unwrap())
    }

    fn matcher() -> Matcher {
        Matcher::from_settings(&Settings::default(), Arc::new(FixedSimilarity(0.5)), gazetteer())
            .unwrap()
            .with_limits(MatchLimits {
                min_score: 0.0,
                max_results: 10,
            })
    }

    fn pool() -> Vec<Profile> {
        vec![
            create_candidate("m1", Gender::Male, 28, "Jerusalem"),
            create_candidate("m2", Gender::Male, 30, "Haifa"),
            create_candidate("w1", Gender::Female, 26, "Jerusalem"),
            create_candidate("w2", Gender::Female, 25, "Beit Shemesh"),
            create_candidate("w3", Gender::Female, 40, "Haifa"),
        ]
    }

    #[test]
    fn test_find_matches_basic() {
        let mut prefs = HashMap::new();
        let mut m1 = Preferences::unrestricted("m1");
        m1.constraints = HardConstraints {
            max_age: Some(35),
            max_distance_km: Some(50),
            ..Default::default()
        };
        prefs.insert("m1".to_string(), m1);

        let batch = matcher()
            .filter_and_score("m1", &pool(), &prefs, &ScoringWeights::default())
            .unwrap();

        let ids: Vec<&str> = batch.matches.iter().map(|s| s.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w2"]);
        assert_eq!(batch.total_candidates, 4);
        // m2 (same side) and w3 (age) are rejected
        assert_eq!(batch.rejected, 2);
        assert!(batch.failures.is_empty());
    }

    #[test]
    fn test_matches_sorted_by_score() {
        let prefs: HashMap<String, Preferences> = HashMap::new();
        let batch = matcher()
            .filter_and_score("m1", &pool(), &prefs, &ScoringWeights::default())
            .unwrap();

        assert_eq!(batch.matches.len(), 3);
        for pair in batch.matches.windows(2) {
            assert!(pair[0].total >= pair[1].total);
        }
        assert_eq!(batch.matches[0].candidate_id, "w1");
    }

    #[test]
    fn test_respects_limits() {
        let prefs: HashMap<String, Preferences> = HashMap::new();
        let limited = matcher().with_limits(MatchLimits {
            min_score: 0.0,
            max_results: 1,
        });
        let batch = limited
            .filter_and_score("m1", &pool(), &prefs, &ScoringWeights::default())
            .unwrap();
        assert_eq!(batch.matches.len(), 1);

        let strict = matcher().with_limits(MatchLimits {
            min_score: 0.99,
            max_results: 10,
        });
        let batch = strict
            .filter_and_score("m1", &pool(), &prefs, &ScoringWeights::default())
            .unwrap();
        assert!(batch.matches.is_empty());
    }

    #[test]
    fn test_invalid_candidate_collected() {
        let mut candidates = pool();
        candidates[2].languages.clear();
        let prefs: HashMap<String, Preferences> = HashMap::new();

        let batch = matcher()
            .filter_and_score("m1", &candidates, &prefs, &ScoringWeights::default())
            .unwrap();

        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].candidate_id, "w1");
        assert_eq!(batch.matches.len(), 2);
    }

    #[test]
    fn test_invalid_same_side_candidate_is_rejected_not_failed() {
        let mut candidates = pool();
        candidates[1].location = "  ".to_string();
        let prefs: HashMap<String, Preferences> = HashMap::new();

        let batch = matcher()
            .filter_and_score("m1", &candidates, &prefs, &ScoringWeights::default())
            .unwrap();

        assert!(batch.failures.is_empty());
        assert_eq!(batch.rejected, 1);
        assert_eq!(batch.matches.len(), 3);
    }

    #[test]
    fn test_unknown_requester() {
        let prefs: HashMap<String, Preferences> = HashMap::new();
        let result = matcher().filter_and_score("nobody", &pool(), &prefs, &ScoringWeights::default());
        assert!(matches!(result, Err(MatchError::Input { .. })));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let prefs: HashMap<String, Preferences> = HashMap::new();
        let weights = ScoringWeights {
            semantic: 0.9,
            ..ScoringWeights::default()
        };
        let result = matcher().filter_and_score("m1", &pool(), &prefs, &weights);
        assert!(matches!(result, Err(MatchError::Config(_))));
    }

    #[test]
    fn test_population_stable_matching() {
        let prefs: HashMap<String, Preferences> = HashMap::new();
        let (matching, population) = matcher()
            .stable_matching(&pool(), &prefs, &ScoringWeights::default())
            .unwrap();

        assert_eq!(population.batches.len(), 5);
        assert!(matching.converged);
        assert_eq!(matching.len(), 2);
        assert!(matching.is_partial_bijection());
        assert_eq!(matching.unmatched_b.len(), 1);
    }

    #[test]
    fn test_unscored_profiles_listed_as_unmatched() {
        let candidates = vec![
            create_candidate("m1", Gender::Male, 28, "Jerusalem"),
            create_candidate("w1", Gender::Female, 26, "Jerusalem"),
            create_candidate("w2", Gender::Female, 60, "Jerusalem"),
        ];
        let mut m1 = Preferences::unrestricted("m1");
        m1.constraints.max_age = Some(35);
        let mut w2 = Preferences::unrestricted("w2");
        w2.constraints.min_age = Some(50);
        let prefs = HashMap::from([("m1".to_string(), m1), ("w2".to_string(), w2)]);

        let (matching, population) = matcher()
            .stable_matching(&candidates, &prefs, &ScoringWeights::default())
            .unwrap();

        // w2 rejects m1 and m1 rejects w2, so w2 has no score at all
        assert!(population.scores().iter().all(|s| s.requester_id != "w2" && s.candidate_id != "w2"));
        assert_eq!(matching.partner_of("m1"), Some("w1"));
        assert!(matching.unmatched_a.is_empty());
        assert_eq!(matching.unmatched_b, std::collections::BTreeSet::from(["w2".to_string()]));
        assert!(matching.is_partial_bijection());
    }

    #[test]
    fn test_train_ranker_skips_invalid_feedback() {
        let ranker = Arc::new(RankerAdapter::new(Box::new(LinearRanker::default())));
        let m = matcher().with_ranker(Arc::clone(&ranker));
        let repo = InMemoryRepository::new(pool(), vec![]).unwrap();

        let mut rated = FeedbackExample::new("m1", "w3", FeedbackStatus::Rejected);
        rated.rating = Some(9);
        let feedback = vec![
            FeedbackExample::new("m1", "w1", FeedbackStatus::Matched),
            FeedbackExample::new("m1", "w2", FeedbackStatus::NoResponse),
            rated,
        ];

        let summary = m.train_ranker(&repo, &feedback).unwrap();
        assert_eq!(summary.invalid_examples, 1);
        assert_eq!(summary.examples, 2);
    }

    #[test]
    fn test_train_ranker_requires_configuration() {
        let repo = InMemoryRepository::new(pool(), vec![]).unwrap();
        let result = matcher().train_ranker(&repo, &[]);
        assert!(matches!(result, Err(MatchError::Config(_))));
    }

    #[test]
    fn test_trained_ranker_overrides_totals() {
        let ranker = Arc::new(RankerAdapter::new(Box::new(LinearRanker::default())));
        let m = matcher().with_ranker(Arc::clone(&ranker));
        let repo = InMemoryRepository::new(pool(), vec![]).unwrap();

        let empty = m.train_ranker(&repo, &[FeedbackExample::new("m1", "w1", FeedbackStatus::Matched)]);
        assert!(matches!(empty, Err(MatchError::Input { .. })));

        let feedback = vec![
            FeedbackExample::new("m1", "w1", FeedbackStatus::Matched),
            FeedbackExample::new("m1", "w2", FeedbackStatus::ContactMade),
            FeedbackExample::new("m1", "w3", FeedbackStatus::Rejected),
            FeedbackExample::new("m2", "w3", FeedbackStatus::MeetingArranged),
            FeedbackExample::new("m2", "w1", FeedbackStatus::NoResponse),
            FeedbackExample::new("m2", "ghost", FeedbackStatus::Matched),
        ];
        let summary = m.train_ranker(&repo, &feedback).unwrap();
        assert_eq!(summary.groups, 2);
        assert_eq!(summary.examples, 5);

        let batch = m
            .filter_and_score("m1", &pool(), &repo, &ScoringWeights::default())
            .unwrap();
        assert!(batch.matches.iter().all(|s| s.source == ScoreSource::Learned));
        assert!(batch.matches.iter().all(|s| (0.0..=1.0).contains(&s.total)));
    }
}
