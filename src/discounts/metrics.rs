// Performance metrics for discount resolution
//
// Tracks calculation times, cache hit rates, slow calculations and cache
// invalidations.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use utoipa::ToSchema;

/// Performance threshold for slow calculations (100ms)
const SLOW_OPERATION_THRESHOLD_MS: u64 = 100;

/// Shared counters for the resolver and the cache invalidator
#[derive(Debug, Clone, Default)]
pub struct DiscountMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_errors: AtomicU64,

    calculations: AtomicU64,
    total_calculation_time_us: AtomicU64,
    slow_calculations: AtomicU64,

    invalidations: AtomicU64,
}

impl DiscountMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Cache backend failed and the calculation went straight to the store
    pub fn record_cache_error(&self) {
        self.inner.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.inner.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Cache hit rate (0.0 to 1.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Start timing a discount calculation; recorded when the timer drops
    pub fn start_calculation(&self) -> CalculationTimer {
        CalculationTimer {
            start: Instant::now(),
            metrics: self.clone(),
        }
    }

    fn record_calculation(&self, duration: Duration) {
        self.inner.calculations.fetch_add(1, Ordering::Relaxed);
        self.inner
            .total_calculation_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_millis() as u64 > SLOW_OPERATION_THRESHOLD_MS {
            self.inner.slow_calculations.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow discount calculation: {}ms", duration.as_millis());
        }
    }

    /// Average calculation time in milliseconds
    pub fn avg_calculation_time_ms(&self) -> f64 {
        let count = self.inner.calculations.load(Ordering::Relaxed);
        let total_us = self.inner.total_calculation_time_us.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            (total_us as f64 / count as f64) / 1000.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            cache_hit_rate: self.cache_hit_rate(),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.inner.cache_misses.load(Ordering::Relaxed),
            cache_errors: self.inner.cache_errors.load(Ordering::Relaxed),
            calculations: self.inner.calculations.load(Ordering::Relaxed),
            avg_calculation_time_ms: self.avg_calculation_time_ms(),
            slow_calculations: self.inner.slow_calculations.load(Ordering::Relaxed),
            invalidations: self.inner.invalidations.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        tracing::info!(
            "Discount metrics: cache {:.1}% hit rate ({} hits, {} misses, {} errors), \
             {} calculations avg {:.2}ms ({} slow), {} invalidations",
            summary.cache_hit_rate * 100.0,
            summary.cache_hits,
            summary.cache_misses,
            summary.cache_errors,
            summary.calculations,
            summary.avg_calculation_time_ms,
            summary.slow_calculations,
            summary.invalidations,
        );
    }
}

/// Timer for a single calculation
pub struct CalculationTimer {
    start: Instant,
    metrics: DiscountMetrics,
}

impl Drop for CalculationTimer {
    fn drop(&mut self) {
        self.metrics.record_calculation(self.start.elapsed());
    }
}

/// Point-in-time snapshot of the counters
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub cache_hit_rate: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub calculations: u64,
    pub avg_calculation_time_ms: f64,
    pub slow_calculations: u64,
    pub invalidations: u64,
}
