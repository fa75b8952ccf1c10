//! Registry of live lookup caches.
//!
//! Bulk operations (clear, disable, enable, reload) run against every
//! registered cache in registration order. The registry is an ordinary value:
//! create one at startup and hand it to whatever needs it.

use crate::error::Result;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle operations a registered cache exposes.
pub trait Lifecycle: Send + Sync {
    /// Name used in logs, usually the table name.
    fn name(&self) -> &str;

    /// Empties the cache.
    fn clear(&self);

    /// Turns the cache on, reloading it if needed.
    fn enable(&self) -> Result<()>;

    /// Turns the cache off and empties it.
    fn disable(&self);

    /// Repopulates the cache from its store.
    fn reload(&self) -> Result<()>;
}

/// Ordered set of cache handles.
///
/// # Example
///
/// ```
/// use lookup_cache::config::{CacheMode, LookupConfig};
/// use lookup_cache::memory::MemoryStore;
/// use lookup_cache::schema::KeyType;
/// use lookup_cache::{LookupCache, Registry};
/// use std::sync::Arc;
///
/// let store = MemoryStore::lookup_table("states", "state", KeyType::Integer);
/// let config = LookupConfig {
///     cache: CacheMode::Full,
///     ..LookupConfig::for_field("state")
/// };
/// let states = Arc::new(LookupCache::new(store, config).unwrap());
///
/// let registry = Registry::new();
/// assert!(registry.register(states.clone()));
/// assert!(!registry.register(states.clone()));
///
/// registry.disable_all();
/// assert!(states.disabled());
/// registry.enable_all().unwrap();
/// assert!(states.enabled());
/// ```
#[derive(Default)]
pub struct Registry {
    handles: Mutex<Vec<Arc<dyn Lifecycle>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handle` unless it is already registered.
    ///
    /// Returns true if the handle was added. Membership is by identity: two
    /// distinct caches over the same table are both kept.
    pub fn register<L>(&self, handle: Arc<L>) -> bool
    where
        L: Lifecycle + 'static,
    {
        let handle: Arc<dyn Lifecycle> = handle;
        let mut handles = self.handles.lock();
        if handles.iter().any(|h| same_handle(h, &handle)) {
            return false;
        }
        debug!(name = handle.name(), "registered lookup cache");
        handles.push(handle);
        true
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Names of the registered handles, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.handles
            .lock()
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    /// Clears every registered cache.
    pub fn clear_all(&self) {
        for handle in self.snapshot() {
            handle.clear();
        }
    }

    /// Disables every registered cache.
    pub fn disable_all(&self) {
        info!(count = self.len(), "disabling lookup caches");
        for handle in self.snapshot() {
            handle.disable();
        }
    }

    /// Enables every registered cache. Stops at the first failure.
    pub fn enable_all(&self) -> Result<()> {
        info!(count = self.len(), "enabling lookup caches");
        for handle in self.snapshot() {
            handle.enable()?;
        }
        Ok(())
    }

    /// Reloads every registered cache. Stops at the first failure.
    pub fn reload_all(&self) -> Result<()> {
        for handle in self.snapshot() {
            handle.reload()?;
        }
        Ok(())
    }

    /// Clears every cache and forgets all handles.
    pub fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        info!(count = handles.len(), "shutting down lookup cache registry");
        for handle in handles {
            handle.clear();
        }
    }

    // Bulk operations call into caches without holding the registry lock.
    fn snapshot(&self) -> Vec<Arc<dyn Lifecycle>> {
        self.handles.lock().clone()
    }
}

fn same_handle(a: &Arc<dyn Lifecycle>, b: &Arc<dyn Lifecycle>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracker {
        name: String,
        clears: AtomicUsize,
        reloads: AtomicUsize,
        fail_reload: bool,
    }

    impl Tracker {
        fn named(name: &str) -> Arc<Self> {
            Arc::new(Tracker {
                name: name.to_string(),
                ..Tracker::default()
            })
        }
    }

    impl Lifecycle for Tracker {
        fn name(&self) -> &str {
            &self.name
        }

        fn clear(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }

        fn enable(&self) -> Result<()> {
            self.reload()
        }

        fn disable(&self) {
            self.clear();
        }

        fn reload(&self) -> Result<()> {
            if self.fail_reload {
                return Err(LookupError::InvalidArgument(format!("{} failed", self.name)));
            }
            self.reloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = Registry::new();
        let a = Tracker::named("a");
        assert!(registry.register(a.clone()));
        assert!(!registry.register(a.clone()));
        assert!(registry.register(Tracker::named("a")));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_names_keep_registration_order() {
        let registry = Registry::new();
        for name in ["cities", "states", "countries"] {
            registry.register(Tracker::named(name));
        }
        assert_eq!(registry.names(), vec!["cities", "states", "countries"]);
    }

    #[test]
    fn test_bulk_operations_reach_every_handle() {
        let registry = Registry::new();
        let a = Tracker::named("a");
        let b = Tracker::named("b");
        registry.register(a.clone());
        registry.register(b.clone());

        registry.clear_all();
        registry.disable_all();
        registry.reload_all().unwrap();
        registry.enable_all().unwrap();

        for tracker in [&a, &b] {
            assert_eq!(tracker.clears.load(Ordering::SeqCst), 2);
            assert_eq!(tracker.reloads.load(Ordering::SeqCst), 2);
        }
    }

    #[test]
    fn test_failure_aborts_remaining_handles() {
        let registry = Registry::new();
        let failing = Arc::new(Tracker {
            name: "broken".to_string(),
            fail_reload: true,
            ..Tracker::default()
        });
        let after = Tracker::named("after");
        registry.register(failing);
        registry.register(after.clone());

        assert!(registry.reload_all().is_err());
        assert_eq!(after.reloads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shutdown_clears_and_forgets() {
        let registry = Registry::new();
        let a = Tracker::named("a");
        registry.register(a.clone());

        registry.shutdown();
        assert!(registry.is_empty());
        assert_eq!(a.clears.load(Ordering::SeqCst), 1);

        registry.clear_all();
        assert_eq!(a.clears.load(Ordering::SeqCst), 1);
    }
}
