//! Bounded Map Metrics
//!
//! Metrics specific to the LRU bounded map.

use super::{CacheMetrics, CoreCacheMetrics};
use std::collections::BTreeMap;

/// LRU-specific metrics (extends CoreCacheMetrics)
///
/// On top of the core counters this tracks the configured capacity so that
/// reports show how full a table's LRU is.
#[derive(Debug, Clone)]
pub struct BoundedMapMetrics {
    /// Core metrics common to all containers
    pub core: CoreCacheMetrics,
    /// Capacity at the time of the snapshot
    pub capacity: usize,
    /// Number of resident entries at the time of the snapshot
    pub len: usize,
}

impl BoundedMapMetrics {
    /// Fraction of the capacity currently in use.
    pub fn utilization(&self) -> f64 {
        super::ratio(self.len as u64, self.capacity as u64)
    }

    /// Converts the metrics to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.core.to_btreemap();
        metrics.insert("capacity".to_string(), self.capacity as f64);
        metrics.insert("len".to_string(), self.len as f64);
        metrics.insert("utilization".to_string(), self.utilization());
        metrics
    }
}

impl CacheMetrics for BoundedMapMetrics {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "LRU"
    }
}
