//! Bounded Map (LRU)
//!
//! A fixed-capacity associative container that evicts the least recently used
//! entry once the capacity is exceeded. This is the storage behind a lookup
//! table cached with [`CacheMode::Bounded`](crate::CacheMode::Bounded).
//!
//! # Algorithm
//!
//! Entries live in a doubly linked recency list; a hash map points from each
//! key to its list node. Both reads and writes promote the touched entry to
//! the front of the list, and eviction always takes the node at the back.
//!
//! ```text
//!   most recent                                   least recent
//!   head ⇄ [k3,v3] ⇄ [k1,v1] ⇄ [k7,v7] ⇄ ... ⇄ [k2,v2] ⇄ tail
//!              ▲                                  │
//!           get/put                          evicted first
//! ```
//!
//! # Performance Characteristics
//!
//! - Get / Put / Remove: O(1)
//! - `find` (lookup by predicate): O(n)
//! - `values` / `keys` snapshots: O(n), no reordering
//!
//! # Thread Safety
//!
//! `BoundedMap` is not synchronized; every read mutates recency order and
//! therefore needs `&mut self`. Use
//! [`ConcurrentBoundedMap`](crate::ConcurrentBoundedMap) to share one map
//! between threads.

use crate::config::BoundedMapConfig;
use crate::error::{LookupError, Result};
use crate::list::{Entry, List};
use crate::metrics::{BoundedMapMetrics, CacheMetrics, CoreCacheMetrics};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

#[cfg(feature = "hashbrown")]
pub(crate) use hashbrown::DefaultHashBuilder;
#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
pub(crate) use std::collections::hash_map::RandomState as DefaultHashBuilder;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

/// A fixed-capacity map with least-recently-used eviction.
///
/// # Examples
///
/// ```
/// use lookup_cache::BoundedMap;
/// use std::num::NonZeroUsize;
///
/// let mut map = BoundedMap::new(NonZeroUsize::new(2).unwrap());
/// map.put(1, "one");
/// map.put(2, "two");
///
/// // Reading 1 makes 2 the least recently used entry
/// assert_eq!(map.get(&1), Some(&"one"));
///
/// map.put(3, "three");
/// assert_eq!(map.get(&2), None);
/// assert_eq!(map.get(&1), Some(&"one"));
/// assert_eq!(map.get(&3), Some(&"three"));
/// ```
pub struct BoundedMap<K, V, S = DefaultHashBuilder> {
    capacity: NonZeroUsize,
    list: List<(K, V)>,
    map: HashMap<K, *mut Entry<(K, V)>, S>,
    metrics: CoreCacheMetrics,
}

// SAFETY: BoundedMap owns every node its raw pointers refer to; the pointers
// never escape and are only dereferenced through &self / &mut self.
unsafe impl<K: Send, V: Send, S: Send> Send for BoundedMap<K, V, S> {}

// SAFETY: all mutation requires &mut self; shared references only read.
unsafe impl<K: Sync, V: Sync, S: Sync> Sync for BoundedMap<K, V, S> {}

impl<K: Hash + Eq, V> BoundedMap<K, V, DefaultHashBuilder> {
    /// Creates an empty map holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_hasher(capacity, DefaultHashBuilder::default())
    }

    /// Creates a map from a configuration with an optional hasher.
    pub fn init(config: BoundedMapConfig, hasher: Option<DefaultHashBuilder>) -> Self {
        Self::with_hasher(config.capacity, hasher.unwrap_or_default())
    }

    /// Creates a map, rejecting a zero capacity.
    pub fn try_new(capacity: usize) -> Result<Self> {
        Ok(Self::new(checked_capacity(capacity)?))
    }
}

impl<K, V, S> BoundedMap<K, V, S> {
    /// Maximum number of resident entries.
    #[inline]
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Number of resident entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns true if the map holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> BoundedMap<K, V, S> {
    /// Creates an empty map with a custom hash builder.
    pub fn with_hasher(capacity: NonZeroUsize, hash_builder: S) -> Self {
        BoundedMap {
            capacity,
            list: List::new(),
            map: HashMap::with_capacity_and_hasher(capacity.get(), hash_builder),
            metrics: CoreCacheMetrics::default(),
        }
    }

    /// Returns the value for `key` and promotes it to most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.map.get(key).copied() {
            Some(node) => {
                self.metrics.record_hit();
                // SAFETY: node comes from our map, so it is a live list entry
                unsafe {
                    self.list.move_to_front(node);
                    Some(&(*node).get_value().1)
                }
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Mutable variant of [`get`](Self::get); also promotes the entry.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.map.get(key).copied() {
            Some(node) => {
                self.metrics.record_hit();
                // SAFETY: node comes from our map, so it is a live list entry
                unsafe {
                    self.list.move_to_front(node);
                    Some(&mut (*node).get_value_mut().1)
                }
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Returns the value for `key` without touching recency order.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = self.map.get(key).copied()?;
        // SAFETY: node comes from our map, so it is a live list entry
        unsafe { Some(&(*node).get_value().1) }
    }

    /// Returns true if `key` is resident. Does not promote it.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.contains_key(key)
    }

    /// Returns the first value matching `predicate` and promotes it.
    ///
    /// This is a linear scan, meant for secondary lookups on small maps.
    pub fn find<F>(&mut self, mut predicate: F) -> Option<&V>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let found = self.map.values().copied().find(|&node| {
            // SAFETY: every pointer in the map is a live list entry
            let (k, v) = unsafe { (*node).get_value() };
            predicate(k, v)
        });

        match found {
            Some(node) => {
                self.metrics.record_hit();
                // SAFETY: node comes from our map, so it is a live list entry
                unsafe {
                    self.list.move_to_front(node);
                    Some(&(*node).get_value().1)
                }
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Removes `key` and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = self.map.remove(key)?;
        // SAFETY: node was just unlinked from our map and is still in the list
        let (_, value) = unsafe { self.list.remove(node).into_value() };
        Some(value)
    }

    /// Drops every entry. The capacity is kept.
    pub fn clear(&mut self) {
        self.map.clear();
        self.list.clear();
    }

    /// Iterates entries from least to most recently used without reordering.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.list.iter_oldest_first().map(|(k, v)| (k, v))
    }

    /// Snapshot of the keys, least recently used first.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Snapshot of the values, least recently used first.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Snapshot of all entries, least recently used first.
    pub fn to_vec(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Changes the capacity.
    ///
    /// Shrinking evicts least recently used entries until the map fits.
    /// Growing takes effect immediately and evicts nothing.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        self.capacity = checked_capacity(capacity)?;
        while self.map.len() > self.capacity.get() {
            self.evict_lru();
        }
        Ok(())
    }

    /// Snapshot of this map's counters.
    pub fn metrics_snapshot(&self) -> BoundedMapMetrics {
        BoundedMapMetrics {
            core: self.metrics.clone(),
            capacity: self.capacity.get(),
            len: self.len(),
        }
    }

    fn evict_lru(&mut self) -> Option<(K, V)> {
        let entry = self.list.pop_back()?;
        // SAFETY: popped entries are never sentinels
        let (key, value) = unsafe { entry.into_value() };
        self.map.remove(&key);
        self.metrics.record_eviction();
        Some((key, value))
    }
}

impl<K: Hash + Eq + Clone, V, S: BuildHasher> BoundedMap<K, V, S> {
    /// Inserts or overwrites `key` and promotes it to most recently used.
    ///
    /// Returns the replaced entry when `key` was already present, or the
    /// evicted entry when the insert pushed the map over capacity.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.metrics.record_insertion();

        if let Some(&node) = self.map.get(&key) {
            // SAFETY: node comes from our map, so it is a live list entry
            unsafe {
                self.list.move_to_front(node);
                let slot = (*node).get_value_mut();
                let old = std::mem::replace(slot, (key, value));
                return Some(old);
            }
        }

        let node = self.list.push_front((key.clone(), value));
        self.map.insert(key, node);

        if self.map.len() > self.capacity.get() {
            self.evict_lru()
        } else {
            None
        }
    }

    /// Returns the value for `key`, computing and storing it on a miss.
    ///
    /// `fill` runs while the map is mutably borrowed; it cannot call back
    /// into the same map.
    pub fn fetch_or_insert_with<F>(&mut self, key: K, fill: F) -> &V
    where
        F: FnOnce(&K) -> V,
    {
        let node = match self.map.get(&key).copied() {
            Some(node) => {
                self.metrics.record_hit();
                // SAFETY: node comes from our map, so it is a live list entry
                unsafe { self.list.move_to_front(node) };
                node
            }
            None => {
                self.metrics.record_miss();
                self.metrics.record_insertion();
                let value = fill(&key);
                let node = self.list.push_front((key.clone(), value));
                self.map.insert(key, node);
                // capacity >= 1, so the fresh front entry is never the one evicted
                if self.map.len() > self.capacity.get() {
                    self.evict_lru();
                }
                node
            }
        };
        // SAFETY: node is a live entry of our list
        unsafe { &(*node).get_value().1 }
    }
}

impl<K, V, S> std::fmt::Debug for BoundedMap<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedMap")
            .field("capacity", &self.capacity)
            .field("len", &self.map.len())
            .finish()
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> CacheMetrics for BoundedMap<K, V, S> {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.metrics_snapshot().to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "LRU"
    }
}

pub(crate) fn checked_capacity(capacity: usize) -> Result<NonZeroUsize> {
    NonZeroUsize::new(capacity).ok_or_else(|| {
        LookupError::InvalidArgument(format!("capacity must be at least 1, got {capacity}"))
    })
}
