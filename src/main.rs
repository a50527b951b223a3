use clap::{Parser, Subcommand};
use matchmaker::core::LinearRanker;
use matchmaker::models::ScoringWeights;
use matchmaker::services::{
    Gazetteer, InMemoryRepository, LexicalCosine, PopulationFile, ProfileRepository,
};
use matchmaker::{validate_stability, MatchError, Matcher, RankerAdapter, Settings};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "matchmaker", version, about = "Two-sided compatibility matching")]
struct Cli {
    /// Population snapshot (profiles, preferences, locations, feedback)
    #[arg(short, long)]
    population: PathBuf,

    /// Configuration file; defaults to config/default and config/local
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Train the ranker on the snapshot's feedback before scoring
    #[arg(long)]
    train: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ranked candidates for one requester
    Score {
        /// Requester id
        id: String,
    },
    /// Population-wide stable assignment with a stability check
    Stable,
    /// Ranker feature importance after training on the snapshot's feedback
    Importance,
}

fn init_logging(settings: &Settings) {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.as_str()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    if log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.pretty().init();
    }
}

fn run(cli: Cli, settings: Settings) -> Result<(), MatchError> {
    let file = std::fs::read_to_string(&cli.population)?;
    let population: PopulationFile = serde_json::from_str(&file)?;
    let gazetteer =
        Gazetteer::from_table(&population.locations)?.with_method(settings.providers.distance_method);
    let repository = InMemoryRepository::new(population.profiles, population.preferences)?;

    info!(
        profiles = repository.len(),
        locations = gazetteer.len(),
        feedback = population.feedback.len(),
        "Population loaded"
    );

    let mut matcher = Matcher::from_settings(&settings, Arc::new(LexicalCosine), Arc::new(gazetteer))?;
    let needs_ranker = cli.train || matches!(cli.command, Command::Importance);
    if needs_ranker && matcher.ranker().is_none() {
        let model = LinearRanker::new(
            settings.ranker.epochs,
            settings.ranker.learning_rate,
            settings.ranker.l2,
        );
        matcher = matcher.with_ranker(Arc::new(RankerAdapter::new(Box::new(model))));
    }
    if needs_ranker {
        let summary = matcher.train_ranker(&repository, &population.feedback)?;
        info!(groups = summary.groups, examples = summary.examples, "Ranker ready");
    }

    let weights: ScoringWeights = *matcher.scorer().weights();
    let output = match cli.command {
        Command::Score { id } => {
            let batch = matcher.filter_and_score(&id, repository.profiles(), &repository, &weights)?;
            serde_json::to_value(batch)?
        }
        Command::Stable => {
            let (matching, population) =
                matcher.stable_matching(repository.profiles(), &repository, &weights)?;
            let scores = population.scores();
            let report = validate_stability(&matching, &scores);
            let ranked: Vec<_> = matching
                .ranked_pairs(&scores)
                .into_iter()
                .map(|(a, b, score)| json!({ "a": a, "b": b, "score": score }))
                .collect();
            json!({
                "matching": matching,
                "rankedPairs": ranked,
                "stability": report,
                "failures": population.failures,
            })
        }
        Command::Importance => {
            let importance = matcher
                .ranker()
                .map(|ranker| ranker.feature_importance())
                .unwrap_or_default();
            serde_json::to_value(importance)?
        }
    };

    if let Some(stats) = matcher.cache_stats() {
        info!(
            entries = stats.entries,
            hit_rate = stats.hit_rate,
            "Similarity cache statistics"
        );
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() {
    // Load .env file if present
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    init_logging(&settings);

    if let Err(e) = run(cli, settings) {
        error!("{}", e);
        std::process::exit(1);
    }
}
