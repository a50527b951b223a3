use std::sync::Arc;
use thiserror::Error;

/// Failures of external collaborators (similarity model, geocoder)
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("{provider} timed out after {after_ms}ms")]
    Timeout { provider: &'static str, after_ms: u64 },

    #[error("{0} is unavailable")]
    Unavailable(String),

    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    #[error("{0} worker stopped before replying")]
    WorkerLost(&'static str),
}

/// Semantic similarity between two pieces of free text
///
/// Called with pre-normalized text (trimmed, whitespace collapsed). Must be
/// symmetric and return values in [0, 1].
pub trait TextSimilarity: Send + Sync {
    fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64, ProviderError>;
}

/// Distance lookup between two location keys
pub trait GeoDistance: Send + Sync {
    fn distance_km(&self, location_a: &str, location_b: &str) -> Result<f64, ProviderError>;
}

impl<T: TextSimilarity + ?Sized> TextSimilarity for Arc<T> {
    fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64, ProviderError> {
        (**self).similarity(text_a, text_b)
    }
}

impl<T: GeoDistance + ?Sized> GeoDistance for Arc<T> {
    fn distance_km(&self, location_a: &str, location_b: &str) -> Result<f64, ProviderError> {
        (**self).distance_km(location_a, location_b)
    }
}

/// Similarity provider returning a fixed value; useful to pin the semantic
/// component
#[derive(Debug, Clone, Copy)]
pub struct FixedSimilarity(pub f64);

impl TextSimilarity for FixedSimilarity {
    fn similarity(&self, _text_a: &str, _text_b: &str) -> Result<f64, ProviderError> {
        Ok(self.0)
    }
}
