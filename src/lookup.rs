//! Lookup Cache
//!
//! A [`LookupCache`] fronts one lookup table. It answers lookups by primary
//! key or by the table's human-readable field, from memory when it can and
//! from the [`LookupStore`] when it must.
//!
//! # Modes
//!
//! | Mode | Storage | Populated by |
//! |------|---------|--------------|
//! | `Full` | primary-key map plus field map, under one `RwLock` | eager [`load`](LookupCache::load) |
//! | `Bounded(n)` | LRU keyed by primary key; field lookups scan it | read-through on miss |
//! | `Passthrough` | none | never |
//!
//! A bounded cache is either *safe*, guarded by a
//! [`ConcurrentBoundedMap`] whose lock callers block on, or *unsafe*,
//! guarded by a `try_lock` that never blocks: contention is treated as a
//! cache miss and the write-back is skipped.
//!
//! # Fetch
//!
//! ```text
//!   value ──normalize──▶ cache ──miss──▶ store read ──miss──▶ store create
//!                          │                  │                    │
//!                         hit             write back          (not cached)
//!                          └──────────────────┴──────────▶ record / none / RecordNotFound
//! ```
//!
//! Store I/O never happens while a cache lock is held.
//!
//! # Example
//!
//! ```
//! use lookup_cache::config::{CacheMode, LookupConfig};
//! use lookup_cache::memory::MemoryStore;
//! use lookup_cache::schema::KeyType;
//! use lookup_cache::LookupCache;
//!
//! let store = MemoryStore::lookup_table("states", "state", KeyType::Integer);
//! store.insert(&[("state", "AL".into())]).unwrap();
//!
//! let config = LookupConfig {
//!     cache: CacheMode::Full,
//!     ..LookupConfig::for_field("state")
//! };
//! let states = LookupCache::new(store, config).unwrap();
//!
//! let al = states.lookup("AL").unwrap().unwrap();
//! assert_eq!(states.lookup(al.id()).unwrap(), Some(al));
//! assert_eq!(states.lookup("ZZ").unwrap(), None);
//! ```

use crate::bounded::BoundedMap;
use crate::concurrent::ConcurrentBoundedMap;
use crate::config::lookup::ResolvedOptions;
use crate::config::{CacheMode, LookupConfig, Normalizer};
use crate::error::{LookupError, Result, StoreError};
use crate::metrics::{CacheMetrics, LookupStats, StatsRecorder};
use crate::registry::Lifecycle;
use crate::schema::{Key, Schema, Value};
use crate::store::{LookupStore, Record};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

/// Outcome of [`LookupCache::create`].
#[derive(Debug, Clone, PartialEq)]
pub enum Created<R> {
    /// The record was persisted.
    Saved(R),
    /// The store's validation rejected the record; nothing was persisted.
    Rejected(Vec<String>),
}

impl<R> Created<R> {
    /// Returns true if the record was persisted.
    pub fn is_saved(&self) -> bool {
        matches!(self, Created::Saved(_))
    }

    /// The persisted record, if any.
    pub fn record(&self) -> Option<&R> {
        match self {
            Created::Saved(record) => Some(record),
            Created::Rejected(_) => None,
        }
    }

    /// Consumes the outcome, returning the persisted record.
    pub fn into_record(self) -> Option<R> {
        match self {
            Created::Saved(record) => Some(record),
            Created::Rejected(_) => None,
        }
    }

    /// Validation messages; empty when saved.
    pub fn errors(&self) -> &[String] {
        match self {
            Created::Saved(_) => &[],
            Created::Rejected(messages) => messages,
        }
    }
}

/// Both indexes of a fully cached table.
///
/// Records are kept in load order; the two maps point into `records`.
struct FullIndex<R> {
    records: Vec<R>,
    by_id: HashMap<Key, usize>,
    by_value: HashMap<String, usize>,
}

impl<R> Default for FullIndex<R> {
    fn default() -> Self {
        FullIndex {
            records: Vec::new(),
            by_id: HashMap::new(),
            by_value: HashMap::new(),
        }
    }
}

impl<R: Record> FullIndex<R> {
    fn insert(&mut self, field: &str, record: R) {
        let id = record.id();
        let text = record.field_text(field);

        let slot = match self.by_id.get(&id) {
            Some(&slot) => {
                if let Some(old) = self.records[slot].field_text(field) {
                    if self.by_value.get(&old) == Some(&slot) {
                        self.by_value.remove(&old);
                    }
                }
                self.records[slot] = record;
                slot
            }
            None => {
                self.records.push(record);
                let slot = self.records.len() - 1;
                self.by_id.insert(id, slot);
                slot
            }
        };

        if let Some(text) = text {
            self.by_value.insert(text, slot);
        }
    }

    fn get_by_id(&self, id: &Key) -> Option<&R> {
        self.by_id.get(id).map(|&slot| &self.records[slot])
    }

    fn get_by_value(&self, text: &str) -> Option<&R> {
        self.by_value.get(text).map(|&slot| &self.records[slot])
    }

    fn clear(&mut self) {
        self.records.clear();
        self.by_id.clear();
        self.by_value.clear();
    }
}

enum Storage<R> {
    Passthrough,
    Full(RwLock<FullIndex<R>>),
    Bounded(Mutex<BoundedMap<Key, R>>),
    SafeBounded(ConcurrentBoundedMap<Key, R>),
}

/// The cache in front of one lookup table.
///
/// All methods take `&self`; share a cache between threads with `Arc`.
pub struct LookupCache<S: LookupStore> {
    store: S,
    schema: Schema,
    field: String,
    mode: CacheMode,
    options: ResolvedOptions,
    allow_blank: bool,
    raise_on_miss: bool,
    normalize: Option<Normalizer>,
    storage: Storage<S::Record>,
    enabled: AtomicBool,
    testing: AtomicBool,
    stats: StatsRecorder,
}

impl<S: LookupStore> LookupCache<S> {
    /// Builds a cache for `config.field` over `store`, using the store's
    /// schema. A `Full` cache is loaded before this returns.
    pub fn new(store: S, config: LookupConfig) -> Result<Self>
    where
        S: HasSchema,
    {
        let schema = store.schema().clone();
        Self::with_schema(store, schema, config)
    }

    /// Builds a cache with an explicitly supplied table description.
    pub fn with_schema(store: S, schema: Schema, config: LookupConfig) -> Result<Self> {
        let options = config.resolve(&schema)?;

        let storage = match config.cache {
            CacheMode::Passthrough => Storage::Passthrough,
            CacheMode::Full => Storage::Full(RwLock::new(FullIndex::default())),
            CacheMode::Bounded(capacity) if config.safe => {
                Storage::SafeBounded(ConcurrentBoundedMap::new(capacity))
            }
            CacheMode::Bounded(capacity) => Storage::Bounded(Mutex::new(BoundedMap::new(capacity))),
        };

        let cache = LookupCache {
            store,
            field: config.field,
            mode: config.cache,
            allow_blank: config.allow_blank,
            raise_on_miss: config.raise_on_miss,
            normalize: config.normalize,
            testing: AtomicBool::new(options.testing),
            options,
            schema,
            storage,
            enabled: AtomicBool::new(true),
            stats: StatsRecorder::default(),
        };

        debug!(
            table = %cache.schema.table,
            field = %cache.field,
            mode = cache.mode.name(),
            read_through = cache.options.read,
            find_or_create = cache.options.write,
            "lookup cache configured"
        );

        cache.load()?;
        Ok(cache)
    }

    /// Finds the record for `value`, a primary key or a field value.
    ///
    /// Returns `Ok(None)` on a total miss, or fails with
    /// [`LookupError::RecordNotFound`] when the cache raises on misses.
    ///
    /// Only integers and text are lookup values; anything else fails with
    /// [`LookupError::UnsupportedKey`] before the cache or store is touched.
    /// A value that is not primary-key shaped is compared as field text, so
    /// `5` and `"5"` name the same row.
    pub fn fetch(&self, value: impl Into<Value>) -> Result<Option<S::Record>> {
        let (value, is_key) = self.coerce(value.into())?;
        self.stats.cache_get();

        let mut found = if self.cache_active() {
            let hit = self.cache_read(&value, is_key);
            self.stats.cache_result(hit.is_some());
            hit
        } else {
            None
        };

        if found.is_none() && (self.options.read || self.disabled()) {
            found = self.store_read(&value, is_key)?;
            if let Some(record) = &found {
                if self.cache_active() {
                    self.cache_write(record.clone());
                }
            }
        }

        if found.is_none() && self.options.write {
            found = self.store_write(&value, is_key)?;
        }

        match found {
            None if self.raise_on_miss => Err(LookupError::RecordNotFound {
                table: self.schema.table.clone(),
                value,
            }),
            found => Ok(found),
        }
    }

    /// Table-style lookup: resolves one argument the way `Table[arg]` does.
    ///
    /// `Null` and, unless blanks are allowed, `""` resolve to nothing without
    /// touching the cache. Integers and text are fetched. Floats and booleans
    /// are rejected.
    pub fn lookup(&self, arg: impl Into<Value>) -> Result<Option<S::Record>> {
        match arg.into() {
            Value::Null => Ok(None),
            Value::Text(text) if text.is_empty() && !self.allow_blank => Ok(None),
            value @ (Value::Text(_) | Value::Int(_)) => self.fetch(value),
            other => Err(LookupError::UnsupportedKey {
                table: self.schema.table.clone(),
                kind: other.kind(),
            }),
        }
    }

    /// Resolves every argument with [`lookup`](Self::lookup).
    pub fn lookup_all<I>(&self, args: I) -> Result<Vec<Option<S::Record>>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let results = args
            .into_iter()
            .map(|arg| self.lookup(arg))
            .collect::<Result<Vec<_>>>()?;

        if results.is_empty() {
            return Err(LookupError::InvalidArgument(format!(
                "{}[*args]: at least one argument is required",
                self.schema.table
            )));
        }
        Ok(results)
    }

    /// An already resolved record is its own lookup result.
    pub fn resolve(&self, record: S::Record) -> S::Record {
        record
    }

    /// True when `arg` looks up to `record`.
    ///
    /// `Null`, integers and text are resolved with [`lookup`](Self::lookup)
    /// and compared by primary key. Use [`matches_any`](Self::matches_any)
    /// for a list of candidates.
    pub fn matches(&self, record: &S::Record, arg: impl Into<Value>) -> Result<bool> {
        Ok(self
            .lookup(arg)?
            .is_some_and(|found| found.id() == record.id()))
    }

    /// True when any of `args` looks up to `record`. Stops at the first match.
    pub fn matches_any<I>(&self, record: &S::Record, args: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        for arg in args {
            if self.matches(record, arg)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Creates a record, caching it when the cache is active.
    ///
    /// Validation failures come back as [`Created::Rejected`]; every other
    /// store failure is an error.
    pub fn create(&self, attributes: &[(&str, Value)]) -> Result<Created<S::Record>> {
        match self.create_or_fail(attributes) {
            Ok(record) => Ok(Created::Saved(record)),
            Err(LookupError::Store(StoreError::Invalid { messages })) => {
                Ok(Created::Rejected(messages))
            }
            Err(err) => Err(err),
        }
    }

    /// Creates a record, caching it when the cache is active. Fails on any
    /// store error, validation included.
    pub fn create_or_fail(&self, attributes: &[(&str, Value)]) -> Result<S::Record> {
        let record = self.store.create_atomic(attributes)?;
        if self.cache_active() {
            self.cache_write(record.clone());
        }
        Ok(record)
    }

    /// Ensures a record exists for each value, in one store transaction.
    ///
    /// Values already present are found rather than duplicated. If any value
    /// fails, none of the records created by this call persist.
    pub fn seed<I>(&self, values: I) -> Result<Vec<S::Record>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = values
            .into_iter()
            .map(|value| match value.into() {
                value @ (Value::Text(_) | Value::Int(_)) => self.field_value(&value),
                value => value,
            })
            .collect();
        let field = self.field.as_str();

        let seeded = self.store.transaction(|store| {
            let mut seeded = Vec::with_capacity(values.len());
            for value in &values {
                if let Some(existing) = store.find_by(field, value)? {
                    seeded.push(existing);
                    continue;
                }
                match store.create_atomic(&[(field, value.clone())]) {
                    Ok(record) => seeded.push(record),
                    Err(err) if err.is_unique_violation() => {
                        warn!(table = %self.schema.table, %value, "seed raced a concurrent insert");
                        match store.find_by(field, value)? {
                            Some(record) => seeded.push(record),
                            None => return Err(err),
                        }
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(seeded)
        })?;

        debug!(table = %self.schema.table, count = seeded.len(), "seeded lookup values");

        if self.cache_active() {
            for record in &seeded {
                self.cache_write(record.clone());
            }
        }
        Ok(seeded)
    }

    /// Populates a `Full` cache from the store in `order` order. No-op for
    /// other modes.
    pub fn load(&self) -> Result<()> {
        let Storage::Full(index) = &self.storage else {
            return Ok(());
        };

        let records = self.store.all_ordered(&self.options.order)?;
        let count = records.len();
        {
            let mut index = index.write();
            for record in records {
                index.insert(&self.field, record);
            }
        }
        debug!(table = %self.schema.table, count, "loaded lookup cache");
        Ok(())
    }

    /// Replaces a `Full` cache's contents with a fresh load. No-op for other
    /// modes.
    ///
    /// The store is read before the cache is touched, and the swap happens
    /// under one write lock, so readers never observe a half-empty table.
    pub fn reload(&self) -> Result<()> {
        let Storage::Full(index) = &self.storage else {
            return Ok(());
        };

        let records = self.store.all_ordered(&self.options.order)?;
        let count = records.len();
        {
            let mut index = index.write();
            index.clear();
            for record in records {
                index.insert(&self.field, record);
            }
        }
        debug!(table = %self.schema.table, count, "reloaded lookup cache");
        Ok(())
    }

    /// Empties the cache.
    pub fn clear(&self) {
        match &self.storage {
            Storage::Passthrough => {}
            Storage::Full(index) => index.write().clear(),
            Storage::Bounded(map) => map.lock().clear(),
            Storage::SafeBounded(map) => map.clear(),
        }
    }

    /// Turns the cache back on. Does nothing when already enabled.
    ///
    /// A `Full` cache is reloaded before readers can see it; if the reload
    /// fails the cache stays disabled.
    pub fn enable(&self) -> Result<()> {
        if self.enabled() {
            return Ok(());
        }
        self.reload()?;
        if !self.enabled.swap(true, Ordering::AcqRel) {
            info!(table = %self.schema.table, "lookup cache enabled");
        }
        Ok(())
    }

    /// Turns the cache off and empties it. Fetches read the store while
    /// disabled. Clears only when the cache was actually enabled.
    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            info!(table = %self.schema.table, "lookup cache disabled");
            self.clear();
        }
    }

    /// Runs `f` with the cache disabled, then enables it.
    ///
    /// The cache ends up enabled even if it was disabled beforehand. If `f`
    /// panics the cache stays disabled.
    pub fn with_disabled<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T,
    {
        self.disable();
        let out = f();
        self.enable()?;
        Ok(out)
    }

    /// Fails with [`LookupError::Unsupported`] while the table has an active
    /// cache. Guard destructive table operations (delete, destroy) with it.
    pub fn ensure_destructive_allowed(&self, operation: &str) -> Result<()> {
        if self.has_cache() {
            return Err(LookupError::Unsupported {
                table: self.schema.table.clone(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// True when the table has cache storage and it is enabled.
    pub fn has_cache(&self) -> bool {
        self.mode != CacheMode::Passthrough && self.enabled()
    }

    /// True when a cache miss falls back to a store read.
    pub fn read_through(&self) -> bool {
        self.options.read
    }

    /// True when missing values are created.
    pub fn find_or_create(&self) -> bool {
        self.options.write
    }

    /// True when `""` is a valid lookup value.
    pub fn allow_blank(&self) -> bool {
        self.allow_blank
    }

    /// True unless [`disable`](Self::disable) was called.
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Opposite of [`enabled`](Self::enabled).
    pub fn disabled(&self) -> bool {
        !self.enabled()
    }

    /// True while the cache is bypassed for reads and writes.
    pub fn testing(&self) -> bool {
        self.testing.load(Ordering::Acquire)
    }

    /// Enters or leaves the bypass state.
    pub fn set_testing(&self, testing: bool) {
        self.testing.store(testing, Ordering::Release);
    }

    /// Snapshot of the store and cache counters.
    pub fn stats(&self) -> LookupStats {
        self.stats.snapshot()
    }

    /// Cached records: load order for `Full`, least recently used first for
    /// `Bounded`, empty for `Passthrough`.
    pub fn values(&self) -> Vec<S::Record> {
        match &self.storage {
            Storage::Passthrough => Vec::new(),
            Storage::Full(index) => index.read().records.clone(),
            Storage::Bounded(map) => map.lock().values(),
            Storage::SafeBounded(map) => map.values(),
        }
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Passthrough => 0,
            Storage::Full(index) => index.read().records.len(),
            Storage::Bounded(map) => map.lock().len(),
            Storage::SafeBounded(map) => map.len(),
        }
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One column of every cached record, in [`values`](Self::values) order.
    pub fn pluck(&self, column: &str) -> Vec<Value> {
        self.values()
            .iter()
            .map(|record| record.attribute(column).unwrap_or(Value::Null))
            .collect()
    }

    /// Cache mode chosen at construction.
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Lookup field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Backing table name.
    pub fn table(&self) -> &str {
        &self.schema.table
    }

    /// Backing table description.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The persistence collaborator.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn cache_active(&self) -> bool {
        self.has_cache() && !self.testing()
    }

    fn cache_read(&self, value: &Value, is_key: bool) -> Option<S::Record> {
        let field = self.field.as_str();
        if is_key {
            let key = Key::from_value(value)?;
            match &self.storage {
                Storage::Passthrough => None,
                Storage::Full(index) => index.read().get_by_id(&key).cloned(),
                Storage::Bounded(map) => map.try_lock()?.get(&key).cloned(),
                Storage::SafeBounded(map) => map.get(&key),
            }
        } else {
            let text = value.to_field_text()?;
            let matches = |_: &Key, record: &S::Record| {
                record.field_text(field).as_deref() == Some(text.as_str())
            };
            match &self.storage {
                Storage::Passthrough => None,
                Storage::Full(index) => index.read().get_by_value(&text).cloned(),
                Storage::Bounded(map) => map.try_lock()?.find(matches).cloned(),
                Storage::SafeBounded(map) => map.find(matches),
            }
        }
    }

    // The active check is repeated under the storage lock: `disable` flips
    // the flag before it clears, so a write that raced it is either skipped
    // here or wiped by that clear.
    fn cache_write(&self, record: S::Record) {
        match &self.storage {
            Storage::Passthrough => {}
            Storage::Full(index) => {
                let mut index = index.write();
                if self.cache_active() {
                    index.insert(&self.field, record);
                }
            }
            Storage::Bounded(map) => {
                if let Some(mut map) = map.try_lock() {
                    if self.cache_active() {
                        map.put(record.id(), record);
                    }
                }
            }
            Storage::SafeBounded(map) => map.with_lock(|map| {
                if self.cache_active() {
                    map.put(record.id(), record);
                }
            }),
        }
    }

    /// Splits a lookup value into primary-key or field form.
    fn coerce(&self, value: Value) -> Result<(Value, bool)> {
        if self.schema.is_primary_key(&value) {
            return Ok((value, true));
        }
        match value {
            Value::Text(_) | Value::Int(_) => Ok((self.field_value(&value), false)),
            other => Err(LookupError::UnsupportedKey {
                table: self.schema.table.clone(),
                kind: other.kind(),
            }),
        }
    }

    // Field text, normalized when configured. Non-text values pass through.
    fn field_value(&self, value: &Value) -> Value {
        match (value.to_field_text(), &self.normalize) {
            (Some(text), Some(normalize)) => Value::Text(normalize(&text)),
            (Some(text), None) => Value::Text(text),
            (None, _) => value.clone(),
        }
    }

    fn column_for(&self, is_key: bool) -> &str {
        if is_key {
            &self.schema.primary_key
        } else {
            &self.field
        }
    }

    fn store_read(&self, value: &Value, is_key: bool) -> Result<Option<S::Record>> {
        let found = self.store.find_by(self.column_for(is_key), value)?;
        self.stats.store_read(found.is_some());
        Ok(found)
    }

    fn store_write(&self, value: &Value, is_key: bool) -> Result<Option<S::Record>> {
        // a missing id is not something we can create
        if is_key {
            return Ok(None);
        }

        match self.store.create_atomic(&[(self.field.as_str(), value.clone())]) {
            Ok(record) => {
                debug!(table = %self.schema.table, %value, "created missing lookup value");
                Ok(Some(record))
            }
            Err(err) if err.is_unique_violation() => {
                warn!(table = %self.schema.table, %value, "lost create race, reading winner");
                self.store_read(value, false)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Stores that know the schema of the table they hold.
pub trait HasSchema {
    /// Description of the backing table.
    fn schema(&self) -> &Schema;
}

impl<S: HasSchema> HasSchema for std::sync::Arc<S> {
    fn schema(&self) -> &Schema {
        (**self).schema()
    }
}

impl<S: LookupStore> Lifecycle for LookupCache<S> {
    fn name(&self) -> &str {
        self.table()
    }

    fn clear(&self) {
        LookupCache::clear(self);
    }

    fn enable(&self) -> Result<()> {
        LookupCache::enable(self)
    }

    fn disable(&self) {
        LookupCache::disable(self);
    }

    fn reload(&self) -> Result<()> {
        LookupCache::reload(self)
    }
}

impl<S: LookupStore> CacheMetrics for LookupCache<S> {
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.stats().to_btreemap();
        metrics.insert("len".to_string(), self.len() as f64);
        if let CacheMode::Bounded(capacity) = self.mode {
            metrics.insert("capacity".to_string(), capacity.get() as f64);
        }
        metrics
    }

    fn algorithm_name(&self) -> &'static str {
        "Lookup"
    }
}

impl<S: LookupStore> fmt::Debug for LookupCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupCache")
            .field("table", &self.schema.table)
            .field("field", &self.field)
            .field("mode", &self.mode)
            .field("enabled", &self.enabled())
            .field("testing", &self.testing())
            .finish()
    }
}
