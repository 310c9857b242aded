//! Scan-scoped memoization of per-symbol lookups.
//!
//! One [`ScanCache`] lives exactly as long as one scan. It is handed to the pipeline
//! explicitly and dropped with the scan, so nothing leaks into the next run.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    RelativeVolume,
    FloatMillions,
    PreviousClose,
    Headline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Number(f64),
    MaybeNumber(Option<f64>),
    Text(Option<String>),
}

impl Metric {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::MaybeNumber(n) => *n,
            Self::Text(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(t) => t,
            _ => None,
        }
    }
}

type Slot = Arc<OnceCell<Metric>>;

#[derive(Debug, Default)]
pub struct ScanCache {
    slots: Mutex<HashMap<(String, MetricKey), Slot>>,
    computations: AtomicUsize,
}

impl ScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored for `(symbol, key)`, running `compute` only if none exists.
    /// Concurrent callers for the same pair wait on a single computation.
    pub async fn get_or_compute<F, Fut>(&self, symbol: &str, key: MetricKey, compute: F) -> Metric
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Metric>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots
                .entry((symbol.to_string(), key))
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        slot.get_or_init(|| async {
            self.computations.fetch_add(1, Ordering::Relaxed);
            compute().await
        })
        .await
        .clone()
    }

    /// Number of values actually computed (cache misses).
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn computes_once_per_symbol_and_key() {
        let cache = ScanCache::new();

        let a = cache
            .get_or_compute("AAA", MetricKey::FloatMillions, || async { Metric::Number(12.0) })
            .await;
        let b = cache
            .get_or_compute("AAA", MetricKey::FloatMillions, || async { Metric::Number(99.0) })
            .await;

        assert_eq!(a, Metric::Number(12.0));
        assert_eq!(b, Metric::Number(12.0));
        assert_eq!(cache.computations(), 1);
    }

    #[tokio::test]
    async fn keys_and_symbols_are_independent() {
        let cache = ScanCache::new();
        cache
            .get_or_compute("AAA", MetricKey::FloatMillions, || async { Metric::Number(1.0) })
            .await;
        cache
            .get_or_compute("AAA", MetricKey::RelativeVolume, || async { Metric::Number(2.0) })
            .await;
        cache
            .get_or_compute("BBB", MetricKey::FloatMillions, || async { Metric::Number(3.0) })
            .await;

        assert_eq!(cache.computations(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_computation() {
        let cache = ScanCache::new();
        let slow = || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Metric::Text(Some("headline".to_string()))
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_compute("AAA", MetricKey::Headline, slow),
            cache.get_or_compute("AAA", MetricKey::Headline, slow),
            cache.get_or_compute("AAA", MetricKey::Headline, slow),
        );

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(cache.computations(), 1);
    }

    #[tokio::test]
    async fn fresh_cache_recomputes() {
        let first = ScanCache::new();
        first
            .get_or_compute("AAA", MetricKey::PreviousClose, || async {
                Metric::MaybeNumber(Some(4.0))
            })
            .await;

        let second = ScanCache::new();
        let v = second
            .get_or_compute("AAA", MetricKey::PreviousClose, || async {
                Metric::MaybeNumber(None)
            })
            .await;

        assert_eq!(v.as_number(), None);
        assert_eq!(second.computations(), 1);
    }
}
