//! Registry Tests
//!
//! Bulk lifecycle operations across real lookup caches.

use lookup_cache::config::{CacheMode, LookupConfig};
use lookup_cache::memory::{MemoryRecord, MemoryStore};
use lookup_cache::{
    HasSchema, KeyType, LookupCache, LookupError, LookupStore, Registry, Schema, StoreError, Value,
};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn seeded(table: &str, singular: &str, values: &[&str]) -> Arc<MemoryStore> {
    let store = MemoryStore::lookup_table(table, singular, KeyType::Integer);
    for value in values {
        store.insert(&[(singular, Value::from(*value))]).unwrap();
    }
    Arc::new(store)
}

fn full_cache(store: &Arc<MemoryStore>, field: &str) -> Arc<LookupCache<Arc<MemoryStore>>> {
    let config = LookupConfig {
        cache: CacheMode::Full,
        ..LookupConfig::for_field(field)
    };
    Arc::new(LookupCache::new(Arc::clone(store), config).unwrap())
}

/// Scans fail once `failing` is set.
struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl LookupStore for FlakyStore {
    type Record = MemoryRecord;

    fn find_by(&self, column: &str, value: &Value) -> Result<Option<MemoryRecord>, StoreError> {
        self.inner.find_by(column, value)
    }

    fn create_atomic(&self, attributes: &[(&str, Value)]) -> Result<MemoryRecord, StoreError> {
        self.inner.create_atomic(attributes)
    }

    fn all_ordered(&self, order_by: &str) -> Result<Vec<MemoryRecord>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("replica unavailable".to_string()));
        }
        self.inner.all_ordered(order_by)
    }
}

impl HasSchema for FlakyStore {
    fn schema(&self) -> &Schema {
        self.inner.schema()
    }
}

#[test]
fn test_registry_drives_every_cache() {
    let states_store = seeded("states", "state", &["AL", "AK"]);
    let cities_store = seeded("cities", "city", &["Austin"]);
    let states = full_cache(&states_store, "state");
    let cities = full_cache(&cities_store, "city");

    let agents = Arc::new(
        LookupCache::new(
            seeded("user_agents", "user_agent", &[]),
            LookupConfig {
                cache: CacheMode::Bounded(NonZeroUsize::new(10).unwrap()),
                find_or_create: true,
                ..LookupConfig::for_field("user_agent")
            },
        )
        .unwrap(),
    );

    let registry = Registry::new();
    assert!(registry.register(states.clone()));
    assert!(registry.register(cities.clone()));
    assert!(registry.register(agents.clone()));
    assert!(!registry.register(states.clone()));
    assert_eq!(registry.names(), vec!["states", "cities", "user_agents"]);

    agents.fetch("Mozilla").unwrap();
    agents.fetch("Mozilla").unwrap();
    assert_eq!(agents.len(), 1);

    registry.disable_all();
    assert!(states.disabled() && cities.disabled() && agents.disabled());
    assert!(states.is_empty() && cities.is_empty() && agents.is_empty());

    registry.enable_all().unwrap();
    assert_eq!(states.len(), 2);
    assert_eq!(cities.len(), 1);
    assert!(agents.is_empty());

    states_store.insert(&[("state", "AZ".into())]).unwrap();
    registry.reload_all().unwrap();
    assert_eq!(states.len(), 3);

    registry.clear_all();
    assert!(states.is_empty() && cities.is_empty());
    assert!(states.enabled());
}

#[test]
fn test_reload_all_stops_at_first_failure() {
    let flaky = Arc::new(
        LookupCache::new(
            FlakyStore {
                inner: MemoryStore::lookup_table("regions", "region", KeyType::Integer),
                failing: AtomicBool::new(false),
            },
            LookupConfig {
                cache: CacheMode::Full,
                ..LookupConfig::for_field("region")
            },
        )
        .unwrap(),
    );
    let states_store = seeded("states", "state", &["AL"]);
    let states = full_cache(&states_store, "state");

    let registry = Registry::new();
    registry.register(flaky.clone());
    registry.register(states.clone());

    flaky.store().failing.store(true, Ordering::SeqCst);
    let err = registry.reload_all().unwrap_err();
    assert!(matches!(err, LookupError::Store(StoreError::Backend(_))));
    assert_eq!(states_store.scan_calls(), 1);

    registry.disable_all();
    assert!(registry.enable_all().is_err());
    assert!(flaky.disabled());
    assert!(states.disabled());
}

#[test]
fn test_shutdown_releases_caches() {
    let store = seeded("states", "state", &["AL"]);
    let states = full_cache(&store, "state");

    let registry = Registry::new();
    registry.register(states.clone());
    assert_eq!(Arc::strong_count(&states), 2);

    registry.shutdown();
    assert!(registry.is_empty());
    assert!(states.is_empty());
    assert_eq!(Arc::strong_count(&states), 1);
}
