//! Cache statistics and metrics tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Current number of L1 entries
    pub size: usize,

    /// Maximum allowed L1 entries (None = unbounded)
    pub max_size: Option<usize>,

    /// L1 hits
    pub hits: u64,

    /// L1 misses (absent or expired)
    pub misses: u64,

    /// L2 reads that found a value
    pub l2_hits: u64,

    /// L2 reads that found nothing or failed
    pub l2_misses: u64,

    /// L1 writes
    pub inserts: u64,

    /// Entries removed by discard passes
    pub evictions: u64,

    /// Entries removed because their expiry passed
    pub expirations: u64,

    /// Number of discard passes run
    pub discard_passes: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total accesses)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_accesses();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate miss rate (misses / total accesses)
    pub fn miss_rate(&self) -> f64 {
        if self.total_accesses() == 0 {
            0.0
        } else {
            1.0 - self.hit_rate()
        }
    }

    /// Calculate fill percentage (size / max_size)
    pub fn fill_percentage(&self) -> Option<f64> {
        self.max_size.map(|max| if max == 0 { 0.0 } else { self.size as f64 / max as f64 })
    }

    /// Total number of L1 lookups (hits + misses)
    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Lock-free counters shared by clones of a cache
#[derive(Debug, Clone, Default)]
pub(crate) struct MetricsCollector {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    l2_hits: AtomicU64,
    l2_misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    discard_passes: AtomicU64,
}

impl MetricsCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_l2_hit(&self) {
        self.inner.l2_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_l2_miss(&self) {
        self.inner.l2_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inner.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        self.inner.discard_passes.fetch_add(1, Ordering::Relaxed);
        self.inner.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: usize) {
        self.inner.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub(crate) fn snapshot(&self, size: usize, max_size: Option<usize>) -> CacheStats {
        let c = &self.inner;
        CacheStats {
            size,
            max_size,
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            l2_hits: c.l2_hits.load(Ordering::Relaxed),
            l2_misses: c.l2_misses.load(Ordering::Relaxed),
            inserts: c.inserts.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            expirations: c.expirations.load(Ordering::Relaxed),
            discard_passes: c.discard_passes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for light::stats.
    use super::*;

    /// Validates `CacheStats` rate helpers.
    ///
    /// Assertions:
    /// - Confirms hit and miss rates for 3 hits and 1 miss.
    /// - Confirms rates are zero without accesses.
    /// - Confirms fill percentage is None when unbounded.
    #[test]
    fn test_stats_rates() {
        let stats = CacheStats { size: 5, max_size: Some(10), hits: 3, misses: 1, ..Default::default() };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert!((stats.miss_rate() - 0.25).abs() < f64::EPSILON);
        assert_eq!(stats.fill_percentage(), Some(0.5));

        let empty = CacheStats::default();
        assert_eq!(empty.hit_rate(), 0.0);
        assert_eq!(empty.miss_rate(), 0.0);
        assert_eq!(empty.fill_percentage(), None);
    }

    /// Validates clones of the collector share counters.
    ///
    /// Assertions:
    /// - Confirms events recorded through a clone appear in the snapshot.
    /// - Confirms one discard pass counts once with all its evictions.
    #[test]
    fn test_collector_clones_share_counters() {
        let metrics = MetricsCollector::new();
        let clone = metrics.clone();

        clone.record_hit();
        metrics.record_miss();
        clone.record_evictions(3);

        let snapshot = metrics.snapshot(2, None);
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.evictions, 3);
        assert_eq!(snapshot.discard_passes, 1);
    }
}
