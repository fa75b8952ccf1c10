//! Concurrent Bounded Map Implementation
//!
//! [`BoundedMap`] behind one exclusive lock. Values are returned by clone so
//! no reference outlives the guard.

use crate::bounded::{BoundedMap, DefaultHashBuilder};
use crate::config::BoundedMapConfig;
use crate::error::Result;
use crate::metrics::{BoundedMapMetrics, CacheMetrics};
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

/// A thread-safe LRU map with one lock around the whole container.
///
/// # Type Parameters
///
/// - `K`: Key type. Must implement `Hash + Eq + Clone + Send`.
/// - `V`: Value type. Must implement `Clone + Send`.
/// - `S`: Hash builder type. Defaults to `DefaultHashBuilder`.
///
/// # Example
///
/// ```
/// use lookup_cache::ConcurrentBoundedMap;
/// use std::num::NonZeroUsize;
///
/// let map = ConcurrentBoundedMap::new(NonZeroUsize::new(2).unwrap());
/// map.put("AL", 1);
/// map.put("AK", 2);
/// assert_eq!(map.get("AL"), Some(1));
///
/// map.put("AZ", 3);
/// assert_eq!(map.get("AK"), None);
/// ```
pub struct ConcurrentBoundedMap<K, V, S = DefaultHashBuilder> {
    inner: Mutex<BoundedMap<K, V, S>>,
}

impl<K, V> ConcurrentBoundedMap<K, V, DefaultHashBuilder>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
{
    /// Creates an empty map holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::from_map(BoundedMap::new(capacity))
    }

    /// Creates a map from a configuration with an optional hasher.
    pub fn init(config: BoundedMapConfig, hasher: Option<DefaultHashBuilder>) -> Self {
        Self::from_map(BoundedMap::init(config, hasher))
    }

    /// Creates a map, rejecting a zero capacity.
    pub fn try_new(capacity: usize) -> Result<Self> {
        BoundedMap::try_new(capacity).map(Self::from_map)
    }
}

impl<K, V, S> ConcurrentBoundedMap<K, V, S>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
    S: BuildHasher + Send,
{
    /// Creates an empty map with a custom hash builder.
    pub fn with_hasher(capacity: NonZeroUsize, hash_builder: S) -> Self {
        Self::from_map(BoundedMap::with_hasher(capacity, hash_builder))
    }

    /// Wraps an existing map.
    pub fn from_map(map: BoundedMap<K, V, S>) -> Self {
        ConcurrentBoundedMap {
            inner: Mutex::new(map),
        }
    }

    /// Maximum number of resident entries.
    pub fn capacity(&self) -> NonZeroUsize {
        self.inner.lock().capacity()
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Returns a clone of the value for `key` and promotes it.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.lock().get(key).cloned()
    }

    /// Applies `f` to the value for `key` under the lock, promoting it.
    ///
    /// Avoids cloning large values. `f` must not touch this map.
    pub fn get_with<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&V) -> R,
    {
        self.inner.lock().get(key).map(f)
    }

    /// Returns a clone of the value for `key` without promoting it.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.lock().peek(key).cloned()
    }

    /// Returns true if `key` is resident. Does not promote it.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.lock().contains_key(key)
    }

    /// Returns a clone of the first value matching `predicate` and promotes it.
    pub fn find<F>(&self, predicate: F) -> Option<V>
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.inner.lock().find(predicate).cloned()
    }

    /// Inserts or overwrites `key`; see [`BoundedMap::put`].
    pub fn put(&self, key: K, value: V) -> Option<(K, V)> {
        self.inner.lock().put(key, value)
    }

    /// Returns the value for `key`, filling it under the lock on a miss.
    ///
    /// `fill` must be cheap and must not touch this map.
    pub fn fetch_or_insert_with<F>(&self, key: K, fill: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        self.inner.lock().fetch_or_insert_with(key, fill).clone()
    }

    /// Removes `key` and returns its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.lock().remove(key)
    }

    /// Drops every entry. The capacity is kept.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Snapshot of the keys, least recently used first.
    pub fn keys(&self) -> Vec<K> {
        self.inner.lock().keys()
    }

    /// Snapshot of the values, least recently used first.
    pub fn values(&self) -> Vec<V> {
        self.inner.lock().values()
    }

    /// Snapshot of all entries, least recently used first.
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.inner.lock().to_vec()
    }

    /// Changes the capacity; see [`BoundedMap::set_capacity`].
    pub fn set_capacity(&self, capacity: usize) -> Result<()> {
        self.inner.lock().set_capacity(capacity)
    }

    /// Runs `f` with exclusive access to the underlying map.
    ///
    /// Lets callers combine several operations atomically. `f` must not
    /// touch this map through `self`.
    pub fn with_lock<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut BoundedMap<K, V, S>) -> R,
    {
        f(&mut self.inner.lock())
    }

    /// Snapshot of the map's counters.
    pub fn metrics_snapshot(&self) -> BoundedMapMetrics {
        self.inner.lock().metrics_snapshot()
    }
}

impl<K, V, S> CacheMetrics for ConcurrentBoundedMap<K, V, S>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
    S: BuildHasher + Send,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.metrics_snapshot().to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "ConcurrentLRU"
    }
}

impl<K, V, S> std::fmt::Debug for ConcurrentBoundedMap<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.inner.lock();
        f.debug_struct("ConcurrentBoundedMap")
            .field("capacity", &map.capacity())
            .field("len", &map.len())
            .finish()
    }
}
