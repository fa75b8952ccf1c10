//! Cache Metrics System
//!
//! Provides a small metrics layer shared by the bounded maps and the lookup
//! caches. Every component reports through the [`CacheMetrics`] trait as a
//! `BTreeMap<String, f64>`, so output ordering is deterministic and reports
//! from different tables can be compared side by side.

use std::collections::BTreeMap;

pub mod bounded;
pub mod lookup;

pub use bounded::BoundedMapMetrics;
pub use lookup::{LookupCounters, LookupStats, StatsRecorder};

/// Common metrics tracked by every in-memory container.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoreCacheMetrics {
    /// Total number of lookups made against the container
    pub requests: u64,

    /// Number of lookups that found an entry
    pub cache_hits: u64,

    /// Number of entries written (new keys and overwrites)
    pub insertions: u64,

    /// Number of entries dropped to honour the capacity limit
    pub evictions: u64,
}

impl CoreCacheMetrics {
    /// Records a lookup that found its entry.
    pub fn record_hit(&mut self) {
        self.requests += 1;
        self.cache_hits += 1;
    }

    /// Records a lookup that found nothing.
    ///
    /// Misses are derived as `requests - cache_hits`.
    pub fn record_miss(&mut self) {
        self.requests += 1;
    }

    /// Records a write into the container.
    pub fn record_insertion(&mut self) {
        self.insertions += 1;
    }

    /// Records a capacity eviction.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Returns the number of lookups that found nothing.
    pub fn cache_misses(&self) -> u64 {
        self.requests - self.cache_hits
    }

    /// Hit ratio between 0.0 and 1.0, or 0.0 before the first request.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.cache_hits, self.requests)
    }

    /// Miss ratio between 0.0 and 1.0, or 0.0 before the first request.
    pub fn miss_rate(&self) -> f64 {
        ratio(self.cache_misses(), self.requests)
    }

    /// Converts the counters to a sorted map for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        metrics.insert("cache_hits".to_string(), self.cache_hits as f64);
        metrics.insert("cache_misses".to_string(), self.cache_misses() as f64);
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("insertions".to_string(), self.insertions as f64);
        metrics.insert("requests".to_string(), self.requests as f64);

        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics.insert("miss_rate".to_string(), self.miss_rate());

        metrics
    }
}

pub(crate) fn ratio(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64
    } else {
        0.0
    }
}

/// Trait implemented by every component that reports metrics.
///
/// The returned map is keyed by metric name in alphabetical order so that
/// reports are reproducible across runs.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Short identifier of the reporting component (e.g. "LRU", "Lookup").
    fn algorithm_name(&self) -> &'static str;
}
