//! Behaviour Tests for Lookup Caches
//!
//! Exercises the fetch protocol end to end against `MemoryStore` and against
//! purpose-built faulty stores injected through the `LookupStore` trait.

use lookup_cache::config::{CacheMode, LookupConfig};
use lookup_cache::memory::{MemoryRecord, MemoryStore};
use lookup_cache::{
    HasSchema, KeyType, LookupCache, LookupError, LookupStore, Schema, StoreError, Value,
};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// HELPERS
// ============================================================================

fn bounded(n: usize) -> CacheMode {
    CacheMode::Bounded(NonZeroUsize::new(n).unwrap())
}

fn user_agents() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::lookup_table(
        "user_agents",
        "user_agent",
        KeyType::Integer,
    ))
}

fn states(values: &[&str]) -> Arc<MemoryStore> {
    let store = MemoryStore::lookup_table("states", "state", KeyType::Integer);
    for value in values {
        store.insert(&[("state", (*value).into())]).unwrap();
    }
    Arc::new(store)
}

fn full(field: &str) -> LookupConfig {
    LookupConfig {
        cache: CacheMode::Full,
        ..LookupConfig::for_field(field)
    }
}

/// Loses every create race: the first field read reports a miss while
/// another writer inserts the same value.
struct RacingStore {
    inner: MemoryStore,
    raced: AtomicBool,
}

impl LookupStore for RacingStore {
    type Record = MemoryRecord;

    fn find_by(&self, column: &str, value: &Value) -> Result<Option<MemoryRecord>, StoreError> {
        if column == "user_agent" && !self.raced.swap(true, Ordering::SeqCst) {
            self.inner.insert(&[(column, value.clone())])?;
            return Ok(None);
        }
        self.inner.find_by(column, value)
    }

    fn create_atomic(&self, attributes: &[(&str, Value)]) -> Result<MemoryRecord, StoreError> {
        self.inner.create_atomic(attributes)
    }

    fn all_ordered(&self, order_by: &str) -> Result<Vec<MemoryRecord>, StoreError> {
        self.inner.all_ordered(order_by)
    }
}

impl HasSchema for RacingStore {
    fn schema(&self) -> &Schema {
        self.inner.schema()
    }
}

/// Every operation fails with a backend error.
struct BrokenStore {
    schema: Schema,
}

impl LookupStore for BrokenStore {
    type Record = MemoryRecord;

    fn find_by(&self, _: &str, _: &Value) -> Result<Option<MemoryRecord>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    fn create_atomic(&self, _: &[(&str, Value)]) -> Result<MemoryRecord, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    fn all_ordered(&self, _: &str) -> Result<Vec<MemoryRecord>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

impl HasSchema for BrokenStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }
}

// ============================================================================
// FETCH SCENARIOS
// ============================================================================

#[test]
fn test_bounded_find_or_create_creates_once() {
    let store = user_agents();
    let cache = LookupCache::new(
        Arc::clone(&store),
        LookupConfig {
            cache: bounded(2),
            find_or_create: true,
            ..LookupConfig::for_field("user_agent")
        },
    )
    .unwrap();

    let first = cache.fetch("Mozilla").unwrap().unwrap();
    assert_eq!(first.text("user_agent"), Some("Mozilla"));

    let second = cache.fetch("Mozilla").unwrap().unwrap();
    assert_eq!(second, first);
    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_full_cache_hit_and_absent_value() {
    let store = states(&[]);
    let cache = LookupCache::new(Arc::clone(&store), full("state")).unwrap();
    cache.seed(["AL"]).unwrap();

    let before = cache.stats().store.get;
    assert!(cache.fetch("AL").unwrap().is_some());
    assert_eq!(cache.stats().store.get, before);
    assert_eq!(cache.stats().cache.hit, 1);

    let finds = store.find_calls();
    assert_eq!(cache.fetch("ZZ").unwrap(), None);
    assert_eq!(store.find_calls(), finds);
    assert_eq!(cache.stats().store.get, before);
}

#[test]
fn test_raise_on_miss_names_table_and_value() {
    let cache = LookupCache::new(
        states(&["AL"]),
        LookupConfig {
            raise_on_miss: true,
            ..LookupConfig::for_field("state")
        },
    )
    .unwrap();

    match cache.fetch("missing") {
        Err(LookupError::RecordNotFound { table, value }) => {
            assert_eq!(table, "states");
            assert_eq!(value, Value::from("missing"));
        }
        other => panic!("expected RecordNotFound, got {other:?}"),
    }
    assert!(cache.fetch("AL").unwrap().is_some());
}

#[test]
fn test_read_through_round_trip_hits_cache() {
    let cache = LookupCache::new(
        states(&["AL", "AK"]),
        LookupConfig {
            cache: CacheMode::Full,
            find: Some(true),
            ..LookupConfig::for_field("state")
        },
    )
    .unwrap();
    cache.store().insert(&[("state", "CA".into())]).unwrap();

    let first = cache.fetch("CA").unwrap();
    let second = cache.fetch("CA").unwrap();
    assert!(first.is_some());
    assert_eq!(first, second);

    let stats = cache.stats();
    assert_eq!(stats.cache.get, 2);
    assert_eq!(stats.cache.miss, 1);
    assert_eq!(stats.cache.hit, 1);
    assert_eq!(stats.store.get, 1);
}

#[test]
fn test_both_identities_reach_the_same_record() {
    let cache = LookupCache::new(states(&["AL", "AK", "AZ"]), full("state")).unwrap();
    for record in cache.values() {
        let by_key = cache.fetch(record.id()).unwrap();
        let by_field = cache.fetch(record.text("state").unwrap()).unwrap();
        assert_eq!(by_key.as_ref(), Some(&record));
        assert_eq!(by_field.as_ref(), Some(&record));
    }
}

#[test]
fn test_cached_copies_change_only_on_reload() {
    let cache = LookupCache::new(states(&["AL"]), full("state")).unwrap();
    let al = cache.fetch("AL").unwrap().unwrap();

    cache
        .store()
        .update(&al.id(), "state", "Alabama".into())
        .unwrap();
    assert_eq!(cache.fetch("AL").unwrap(), Some(al));
    assert_eq!(cache.fetch("Alabama").unwrap(), None);

    cache.reload().unwrap();
    assert_eq!(cache.fetch("AL").unwrap(), None);
    assert!(cache.fetch("Alabama").unwrap().is_some());
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_passthrough_always_reads_store() {
    let store = states(&["AL"]);
    let cache = LookupCache::new(Arc::clone(&store), LookupConfig::for_field("state")).unwrap();
    assert!(!cache.has_cache());
    assert!(cache.read_through());

    cache.fetch("AL").unwrap();
    cache.fetch("AL").unwrap();
    assert_eq!(store.find_calls(), 2);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().cache.get, 2);
    assert_eq!(cache.stats().cache.hit, 0);
}

#[test]
fn test_bounded_cache_evicts_least_recent_record() {
    let store = states(&["AL", "AK", "AZ"]);
    let cache = LookupCache::new(
        Arc::clone(&store),
        LookupConfig {
            cache: bounded(2),
            ..LookupConfig::for_field("state")
        },
    )
    .unwrap();

    cache.fetch("AL").unwrap();
    cache.fetch("AK").unwrap();
    cache.fetch("AL").unwrap();
    cache.fetch("AZ").unwrap();

    let cached: Vec<_> = cache
        .pluck("state")
        .into_iter()
        .map(|v| v.as_text().unwrap_or_default().to_string())
        .collect();
    assert_eq!(cached, vec!["AL", "AZ"]);

    let finds = store.find_calls();
    cache.fetch("AL").unwrap();
    assert_eq!(store.find_calls(), finds);
    cache.fetch("AK").unwrap();
    assert_eq!(store.find_calls(), finds + 1);
}

// ============================================================================
// STORE FAILURES
// ============================================================================

#[test]
fn test_lost_create_race_reads_the_winner() {
    let store = RacingStore {
        inner: MemoryStore::lookup_table("user_agents", "user_agent", KeyType::Integer),
        raced: AtomicBool::new(false),
    };
    let cache = LookupCache::new(
        store,
        LookupConfig {
            cache: bounded(2),
            find_or_create: true,
            ..LookupConfig::for_field("user_agent")
        },
    )
    .unwrap();

    let found = cache.fetch("Mozilla").unwrap().unwrap();
    assert_eq!(found.text("user_agent"), Some("Mozilla"));
    assert_eq!(cache.store().inner.len(), 1);
    assert_eq!(cache.store().inner.create_calls(), 1);

    let stats = cache.stats();
    assert_eq!(stats.store.get, 2);
    assert_eq!(stats.store.miss, 1);
    assert_eq!(stats.store.hit, 1);
}

#[test]
fn test_backend_errors_propagate() {
    let schema = Schema::lookup_table("states", "state", KeyType::Integer);
    let err = LookupCache::new(
        BrokenStore {
            schema: schema.clone(),
        },
        full("state"),
    )
    .unwrap_err();
    assert!(matches!(err, LookupError::Store(StoreError::Backend(_))));

    let cache = LookupCache::new(
        BrokenStore { schema },
        LookupConfig {
            find_or_create: true,
            ..LookupConfig::for_field("state")
        },
    )
    .unwrap();
    assert!(matches!(
        cache.fetch("AL"),
        Err(LookupError::Store(StoreError::Backend(_)))
    ));
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn test_rejected_configurations() {
    let unknown = LookupCache::new(states(&[]), LookupConfig::for_field("name"));
    assert!(matches!(unknown, Err(LookupError::UnknownAttribute { .. })));

    let full_create = LookupCache::new(
        states(&[]),
        LookupConfig {
            cache: CacheMode::Full,
            find_or_create: true,
            ..LookupConfig::for_field("state")
        },
    );
    assert!(matches!(full_create, Err(LookupError::Configuration { .. })));

    let raise_create = LookupCache::new(
        states(&[]),
        LookupConfig {
            cache: bounded(3),
            find_or_create: true,
            raise_on_miss: true,
            ..LookupConfig::for_field("state")
        },
    );
    assert!(matches!(raise_create, Err(LookupError::Configuration { .. })));
}

#[test]
fn test_explicit_schema() {
    let store = states(&["AL"]);
    let schema = store.schema().clone();
    let cache = LookupCache::with_schema(store, schema, full("state")).unwrap();
    assert_eq!(cache.table(), "states");
    assert_eq!(cache.field(), "state");
    assert_eq!(cache.mode(), CacheMode::Full);
    assert!(!cache.read_through());
    assert!(!cache.find_or_create());
    assert!(!cache.allow_blank());
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_enable_twice_reloads_once() {
    let store = states(&["AL"]);
    let cache = LookupCache::new(Arc::clone(&store), full("state")).unwrap();
    assert_eq!(store.scan_calls(), 1);

    cache.disable();
    cache.disable();
    cache.enable().unwrap();
    cache.enable().unwrap();
    assert_eq!(store.scan_calls(), 2);
    assert!(cache.has_cache());
}

#[test]
fn test_disabled_bounded_cache_reads_store_and_stays_empty() {
    let store = states(&["AL"]);
    let cache = LookupCache::new(
        Arc::clone(&store),
        LookupConfig {
            cache: bounded(4),
            ..LookupConfig::for_field("state")
        },
    )
    .unwrap();
    cache.fetch("AL").unwrap();
    assert_eq!(cache.len(), 1);

    cache.disable();
    assert!(cache.is_empty());
    assert!(cache.fetch("AL").unwrap().is_some());
    assert!(cache.is_empty());

    cache.enable().unwrap();
    assert!(cache.is_empty());
    cache.fetch("AL").unwrap();
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_with_disabled_reenables() {
    let store = states(&["AL"]);
    let cache = LookupCache::new(Arc::clone(&store), full("state")).unwrap();

    let found = cache
        .with_disabled(|| {
            assert!(cache.disabled());
            cache.fetch("AL").unwrap()
        })
        .unwrap();
    assert!(found.is_some());
    assert!(cache.enabled());
    assert_eq!(cache.len(), 1);
}
