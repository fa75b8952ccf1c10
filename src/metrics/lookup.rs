//! Lookup Cache Statistics
//!
//! Counters for the two tiers a lookup passes through: the in-memory cache
//! and the backing store. Counters only ever grow; they reset with the
//! process.

use super::CacheMetrics;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the get/hit/miss counters for one tier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupCounters {
    /// Number of requests made against the tier
    pub get: u64,
    /// Requests that found a record
    pub hit: u64,
    /// Requests that found nothing
    pub miss: u64,
}

/// Snapshot of a lookup cache's counters, as returned by
/// [`LookupCache::stats`](crate::LookupCache::stats).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupStats {
    /// Backing store reads
    pub store: LookupCounters,
    /// In-memory cache reads
    pub cache: LookupCounters,
}

impl LookupStats {
    /// Converts the snapshot to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        metrics.insert("cache_get".to_string(), self.cache.get as f64);
        metrics.insert("cache_hit".to_string(), self.cache.hit as f64);
        metrics.insert("cache_miss".to_string(), self.cache.miss as f64);
        metrics.insert("store_get".to_string(), self.store.get as f64);
        metrics.insert("store_hit".to_string(), self.store.hit as f64);
        metrics.insert("store_miss".to_string(), self.store.miss as f64);

        let cache_reads = self.cache.hit + self.cache.miss;
        metrics.insert(
            "cache_hit_rate".to_string(),
            super::ratio(self.cache.hit, cache_reads),
        );
        metrics.insert(
            "store_hit_rate".to_string(),
            super::ratio(self.store.hit, self.store.get),
        );

        metrics
    }
}

impl CacheMetrics for LookupStats {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "Lookup"
    }
}

#[derive(Debug, Default)]
struct AtomicCounters {
    get: AtomicU64,
    hit: AtomicU64,
    miss: AtomicU64,
}

impl AtomicCounters {
    fn record(&self, found: bool) {
        if found {
            self.hit.fetch_add(1, Ordering::Relaxed);
        } else {
            self.miss.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> LookupCounters {
        LookupCounters {
            get: self.get.load(Ordering::Relaxed),
            hit: self.hit.load(Ordering::Relaxed),
            miss: self.miss.load(Ordering::Relaxed),
        }
    }
}

/// Lock-free recorder owned by each lookup cache.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    store: AtomicCounters,
    cache: AtomicCounters,
}

impl StatsRecorder {
    /// Counts a call to `fetch`.
    pub fn cache_get(&self) {
        self.cache.get.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts the outcome of an in-memory lookup.
    pub fn cache_result(&self, found: bool) {
        self.cache.record(found);
    }

    /// Counts a store read and its outcome.
    pub fn store_read(&self, found: bool) {
        self.store.get.fetch_add(1, Ordering::Relaxed);
        self.store.record(found);
    }

    /// Takes a consistent-enough snapshot of all counters.
    pub fn snapshot(&self) -> LookupStats {
        LookupStats {
            store: self.store.snapshot(),
            cache: self.cache.snapshot(),
        }
    }
}
