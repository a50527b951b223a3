// Service exports
pub mod cache;
pub mod deadline;
pub mod geo;
pub mod provider;
pub mod repository;
pub mod similarity;

pub use cache::{CacheKey, CacheStats, CachedSimilarity};
pub use deadline::{provider_pool, Deadline};
pub use geo::Gazetteer;
pub use provider::{FixedSimilarity, GeoDistance, ProviderError, TextSimilarity};
pub use repository::{InMemoryRepository, PopulationFile, PreferenceIndex, ProfileRepository};
pub use similarity::{combine_text, normalize_text, LexicalCosine};
