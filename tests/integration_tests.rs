// Integration tests for the matchmaker pipeline

use matchmaker::core::{LinearRanker, MatchLimits, RankerAdapter};
use matchmaker::models::domain::default_languages;
use matchmaker::models::{
    Community, EducationLevel, FeedbackExample, FeedbackStatus, Gender, HardConstraints,
    MaritalStatus, Preferences, Profile, ReligiosityLevel, ScoreSource, ScoringWeights,
};
use matchmaker::services::{
    FixedSimilarity, Gazetteer, InMemoryRepository, LexicalCosine, PopulationFile,
    PreferenceIndex, ProfileRepository,
};
use matchmaker::{validate_stability, MatchError, Matcher, Settings};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn create_test_profile(id: &str, gender: Gender, age: u8, location: &str) -> Profile {
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
        ("Bnei Brak".to_string(), [32.0807, 34.8338]),
        ("Beit Shemesh".to_string(), [31.7470, 34.9881]),
        ("Haifa".to_string(), [32.7940, 34.9896]),
        ("Ashdod".to_string(), [31.8014, 34.6435]),
    ]);
    Arc::new(Gazetteer::from_table(&table).unwrap())
}

fn matcher(similarity: f64) -> Matcher {
    Matcher::from_settings(&Settings::default(), Arc::new(FixedSimilarity(similarity)), gazetteer())
        .unwrap()
        .with_limits(MatchLimits {
            min_score: 0.0,
            max_results: 50,
        })
}

fn population() -> Vec<Profile> {
    let mut profiles = vec![
        create_test_profile("m1", Gender::Male, 28, "Jerusalem"),
        create_test_profile("m2", Gender::Male, 31, "Bnei Brak"),
        create_test_profile("m3", Gender::Male, 24, "Haifa"),
        create_test_profile("w1", Gender::Female, 25, "Jerusalem"),
        create_test_profile("w2", Gender::Female, 29, "Bnei Brak"),
        create_test_profile("w3", Gender::Female, 23, "Ashdod"),
    ];
    profiles[1].community = Community::Hasidic;
    profiles[2].smoking = true;
    profiles[4].community = Community::Hasidic;
    profiles[5].religiosity = ReligiosityLevel::Moderate;
    profiles
}

#[test]
fn test_integration_end_to_end_matching() {
    let profiles = population();
    let mut prefs = Preferences::unrestricted("m1");
    prefs.constraints = HardConstraints {
        min_age: Some(22),
        max_age: Some(28),
        max_distance_km: Some(60),
        smoking: Some(false),
        ..Default::default()
    };
    let repo = InMemoryRepository::new(profiles, vec![prefs]).unwrap();

    let batch = matcher(0.5)
        .filter_and_score("m1", repo.profiles(), &repo, &ScoringWeights::default())
        .unwrap();

    let ids: Vec<&str> = batch.matches.iter().map(|s| s.candidate_id.as_str()).collect();
    // w2 is too old, everyone on the male side is excluded
    assert_eq!(ids, vec!["w1", "w3"]);
    assert!(batch.matches.iter().all(|s| s.candidate_id != "m1"));
    for score in &batch.matches {
        assert!((0.0..=1.0).contains(&score.total));
        assert_eq!(score.source, ScoreSource::Heuristic);
        assert!(!score.explanation.is_empty());
    }
}

#[test]
fn test_concrete_pair_meets_expected_floor() {
    let profiles = vec![
        create_test_profile("a", Gender::Male, 28, "Jerusalem"),
        create_test_profile("b", Gender::Female, 25, "Jerusalem"),
    ];
    let repo = InMemoryRepository::new(profiles, vec![]).unwrap();

    let batch = matcher(0.0)
        .filter_and_score("a", repo.profiles(), &repo, &ScoringWeights::default())
        .unwrap();

    assert_eq!(batch.matches.len(), 1);
    let score = &batch.matches[0];
    assert_eq!(score.semantic, 0.0);
    assert!(score.total >= 0.38);
}

#[test]
fn test_scores_are_convex_combinations() {
    let profiles = population();
    let repo = InMemoryRepository::new(profiles, vec![]).unwrap();
    let weights = ScoringWeights::default();

    let population = matcher(0.7)
        .score_population(repo.profiles(), &repo, &weights)
        .unwrap();

    for score in population.scores() {
        let components = [score.semantic, score.religious, score.age, score.location, score.other];
        let lo = components.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = components.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(score.total >= lo - 1e-9 && score.total <= hi + 1e-9);
    }
}

#[test]
fn test_population_stable_matching_is_stable() {
    let profiles = population();
    let repo = InMemoryRepository::new(profiles, vec![]).unwrap();

    let m = Matcher::from_settings(&Settings::default(), Arc::new(LexicalCosine), gazetteer()).unwrap();
    let (matching, population) = m
        .stable_matching(repo.profiles(), &repo, &ScoringWeights::default())
        .unwrap();

    assert!(matching.converged);
    assert!(matching.is_partial_bijection());
    let report = validate_stability(&matching, &population.scores());
    assert!(report.stable, "violations: {:?}", report.violations);

    let ranked = matching.ranked_pairs(&population.scores());
    assert_eq!(ranked.len(), matching.len());
    for pair in ranked.windows(2) {
        assert!(pair[0].2 >= pair[1].2);
    }
}

#[test]
fn test_requester_failure_does_not_abort_population() {
    let mut profiles = population();
    profiles[0].location = "   ".to_string();
    let repo = InMemoryRepository::new(profiles, vec![]).unwrap();

    let population = matcher(0.5)
        .score_population(repo.profiles(), &repo, &ScoringWeights::default())
        .unwrap();

    assert_eq!(population.failures.len(), 1);
    assert_eq!(population.failures[0].requester_id, "m1");
    assert_eq!(population.batches.len(), 5);
    // the invalid profile still shows up as a candidate failure elsewhere
    let w1 = population.batches.iter().find(|b| b.requester_id == "w1").unwrap();
    assert_eq!(w1.failures.len(), 1);
}

#[test]
fn test_ranker_training_and_fallback() {
    let profiles = population();
    let repo = InMemoryRepository::new(profiles, vec![]).unwrap();
    let ranker = Arc::new(RankerAdapter::new(Box::new(LinearRanker::default())));
    let m = matcher(0.5).with_ranker(Arc::clone(&ranker));

    // untrained: heuristic totals pass through untouched
    let before = m
        .filter_and_score("m1", repo.profiles(), &repo, &ScoringWeights::default())
        .unwrap();
    assert!(before.matches.iter().all(|s| s.source == ScoreSource::Heuristic));

    let feedback = vec![
        FeedbackExample::new("m1", "w1", FeedbackStatus::Matched),
        FeedbackExample::new("m1", "w2", FeedbackStatus::Rejected),
        FeedbackExample::new("m1", "w3", FeedbackStatus::ContactMade),
        FeedbackExample::new("m2", "w2", FeedbackStatus::MeetingArranged),
        FeedbackExample::new("m2", "w1", FeedbackStatus::NoResponse),
    ];
    m.train_ranker(&repo, &feedback).unwrap();
    assert!(ranker.is_trained());

    let importance = ranker.feature_importance();
    let total: f64 = importance.values().sum();
    assert!((total - 100.0).abs() < 1e-6);

    let after = m
        .filter_and_score("m1", repo.profiles(), &repo, &ScoringWeights::default())
        .unwrap();
    assert!(after.matches.iter().all(|s| s.source == ScoreSource::Learned));
}

#[test]
fn test_population_file_round_trip() {
    let json = r#"{
        "profiles": [
            {"id": "m1", "gender": "M", "age": 27, "community": "lithuanian",
             "religiosityLevel": "strict", "location": "Jerusalem", "education": "yeshiva"},
            {"id": "w1", "gender": "F", "age": 24, "community": "lithuanian",
             "religiosityLevel": "strict", "location": "Bnei Brak", "education": "seminary",
             "languages": ["hebrew", "english"]}
        ],
        "preferences": [
            {"candidateId": "m1", "mustHave": {"maxAge": 26, "requiredLanguages": ["english"]},
             "freeText": "kind and serious"}
        ],
        "locations": {"Jerusalem": [31.7683, 35.2137], "Bnei Brak": [32.0807, 34.8338]}
    }"#;
    let file: PopulationFile = serde_json::from_str(json).unwrap();
    assert_eq!(file.locations.len(), 2);

    let repo = InMemoryRepository::new(file.profiles, file.preferences).unwrap();
    let prefs = repo.preferences_for("m1").unwrap();
    assert_eq!(prefs.constraints.max_age, Some(26));
    assert_eq!(
        prefs.constraints.required_languages(),
        Some(&BTreeSet::from(["english".to_string()]))
    );

    let batch = matcher(0.5)
        .filter_and_score("m1", repo.profiles(), &repo, &ScoringWeights::default())
        .unwrap();
    assert_eq!(batch.matches.len(), 1);
}

#[test]
fn test_invalid_constraints_rejected() {
    let profiles = population();
    let mut prefs = Preferences::unrestricted("m1");
    prefs.constraints.min_age = Some(30);
    prefs.constraints.max_age = Some(25);
    let repo = InMemoryRepository::new(profiles, vec![prefs]).unwrap();

    let result = matcher(0.5).filter_and_score("m1", repo.profiles(), &repo, &ScoringWeights::default());
    assert!(matches!(result, Err(MatchError::Input { .. })));
}
