//! Concurrent Bounded Map
//!
//! This module provides the thread-safe counterpart of
//! [`BoundedMap`](crate::BoundedMap), used by lookup caches built with
//! `safe: true`.
//!
//! # Architecture
//!
//! A single `parking_lot::Mutex` guards the whole map. Every operation takes
//! the lock, including `get`, because promoting an entry rewrites the recency
//! list. A lookup table is small and its cache operations are short, so one
//! lock per table is enough; it keeps LRU order global instead of
//! per-segment.
//!
//! ## Why Mutex Instead of RwLock?
//!
//! A read is a write: `get` moves the entry to the front of the recency list.
//! `RwLock` would hand out exclusive guards for every call anyway.
//!
//! ## No Reentrance
//!
//! Closures passed to [`ConcurrentBoundedMap::get_with`],
//! [`ConcurrentBoundedMap::with_lock`] and
//! [`ConcurrentBoundedMap::fetch_or_insert_with`] run while the lock is held.
//! Calling back into the same map from inside them deadlocks. Never perform
//! store I/O inside them either: compute first, then lock to mutate.
//!
//! # Example
//!
//! ```
//! use lookup_cache::ConcurrentBoundedMap;
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let map = Arc::new(ConcurrentBoundedMap::new(NonZeroUsize::new(100).unwrap()));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let map = Arc::clone(&map);
//!         thread::spawn(move || {
//!             for i in 0..10 {
//!                 map.put(t * 10 + i, i);
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for h in handles {
//!     h.join().unwrap();
//! }
//! assert_eq!(map.len(), 40);
//! ```

pub mod bounded;

pub use self::bounded::ConcurrentBoundedMap;
