use crossbeam::channel::{self, RecvTimeoutError};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use std::time::Duration;

use crate::error::MatchError;
use crate::services::provider::{GeoDistance, ProviderError, TextSimilarity};

/// Build the pool external provider calls run on
///
/// Kept apart from the scoring pool so a hung provider cannot starve scoring
/// workers. A panicking provider drops its reply channel and surfaces as
/// [`ProviderError::WorkerLost`].
pub fn provider_pool(threads: usize) -> Result<Arc<ThreadPool>, MatchError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("provider-{}", i))
        .panic_handler(|_| tracing::error!("Provider call panicked"))
        .build()?;
    Ok(Arc::new(pool))
}

/// Runs every call of the wrapped provider under a timeout
///
/// The caller waits at most `timeout`; a late reply is discarded.
pub struct Deadline<P: ?Sized> {
    inner: Arc<P>,
    timeout: Duration,
    pool: Arc<ThreadPool>,
}

impl<P: ?Sized> Deadline<P> {
    pub fn new(inner: Arc<P>, timeout: Duration, pool: Arc<ThreadPool>) -> Self {
        Self {
            inner,
            timeout,
            pool,
        }
    }

    fn run<T, F>(&self, provider: &'static str, call: F) -> Result<T, ProviderError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ProviderError> + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        self.pool.spawn(move || {
            // receiver may already have given up
            let _ = tx.send(call());
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ProviderError::Timeout {
                provider,
                after_ms: self.timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ProviderError::WorkerLost(provider)),
        }
    }
}

impl<P> TextSimilarity for Deadline<P>
where
    P: TextSimilarity + ?Sized + 'static,
{
    fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64, ProviderError> {
        let inner = Arc::clone(&self.inner);
        let (a, b) = (text_a.to_owned(), text_b.to_owned());
        self.run("similarity", move || inner.similarity(&a, &b))
    }
}

impl<P> GeoDistance for Deadline<P>
where
    P: GeoDistance + ?Sized + 'static,
{
    fn distance_km(&self, location_a: &str, location_b: &str) -> Result<f64, ProviderError> {
        let inner = Arc::clone(&self.inner);
        let (a, b) = (location_a.to_owned(), location_b.to_owned());
        self.run("distance", move || inner.distance_km(&a, &b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::FixedSimilarity;

    struct SlowSimilarity(Duration);

    impl TextSimilarity for SlowSimilarity {
        fn similarity(&self, _a: &str, _b: &str) -> Result<f64, ProviderError> {
            std::thread::sleep(self.0);
            Ok(0.9)
        }
    }

    struct PanickingDistance;

    impl GeoDistance for PanickingDistance {
        fn distance_km(&self, _a: &str, _b: &str) -> Result<f64, ProviderError> {
            panic!("geocoder exploded");
        }
    }

    #[test]
    fn test_fast_call_passes_through() {
        let pool = provider_pool(1).unwrap();
        let guarded = Deadline::new(Arc::new(FixedSimilarity(0.7)), Duration::from_secs(5), pool);
        assert_eq!(guarded.similarity("a", "b").unwrap(), 0.7);
    }

    #[test]
    fn test_slow_call_times_out() {
        let pool = provider_pool(1).unwrap();
        let slow = Arc::new(SlowSimilarity(Duration::from_millis(500)));
        let guarded = Deadline::new(slow, Duration::from_millis(20), pool);
        match guarded.similarity("a", "b") {
            Err(ProviderError::Timeout { provider, after_ms }) => {
                assert_eq!(provider, "similarity");
                assert_eq!(after_ms, 20);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_panicking_provider_reports_lost_worker() {
        let pool = provider_pool(1).unwrap();
        let guarded = Deadline::new(Arc::new(PanickingDistance), Duration::from_secs(5), pool);
        assert!(matches!(
            guarded.distance_km("x", "y"),
            Err(ProviderError::WorkerLost("distance"))
        ));
    }
}
