use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::clamp_unit;
use crate::services::provider::{ProviderError, TextSimilarity};

/// Read-through similarity cache
///
/// Concurrent reads are lock-free; on a miss, initialisation is serialized
/// per key so the first successful writer wins and other callers for the
/// same key wait for its value. Provider errors are never cached.
pub struct CachedSimilarity<P: ?Sized> {
    inner: Arc<P>,
    cache: Cache<(String, String), f64>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: TextSimilarity + ?Sized> CachedSimilarity<P> {
    pub fn new(inner: Arc<P>, capacity: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            inner,
            cache: builder.build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            entries: self.cache.entry_count(),
            hit_count: hits,
            miss_count: misses,
            hit_rate: if lookups > 0 {
                hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }
}

impl<P: TextSimilarity + ?Sized> TextSimilarity for CachedSimilarity<P> {
    fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64, ProviderError> {
        let key = CacheKey::similarity(text_a, text_b);

        if let Some(value) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Similarity cache hit");
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Similarity cache miss");

        self.cache
            .try_get_with(key, || self.inner.similarity(text_a, text_b).map(clamp_unit))
            .map_err(|err| (*err).clone())
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Order-independent key for a pair of normalized texts
    pub fn similarity(text_a: &str, text_b: &str) -> (String, String) {
        if text_a <= text_b {
            (text_a.to_owned(), text_b.to_owned())
        } else {
            (text_b.to_owned(), text_a.to_owned())
        }
    }
}
