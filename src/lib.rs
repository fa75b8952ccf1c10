#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Choosing a Cache Mode
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                 Which Cache Mode Should a Table Use?                 │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  ┌──────────────────┐                                                │
//! │  │ Small and fixed? │──Yes──▶ ┌──────────┐                           │
//! │  │ (states, codes)  │         │   Full   │  load once, never evict   │
//! │  └────────┬─────────┘         └──────────┘                           │
//! │          No                                                          │
//! │           ▼                                                          │
//! │  ┌──────────────────┐                                                │
//! │  │ Hot subset?      │──Yes──▶ ┌──────────┐                           │
//! │  │ (user agents)    │         │ Bounded  │  LRU, read-through        │
//! │  └────────┬─────────┘         └──────────┘                           │
//! │          No                                                          │
//! │           ▼                                                          │
//! │     ┌─────────────┐                                                  │
//! │     │ Passthrough │  every fetch reads the store                     │
//! │     └─────────────┘                                                  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Reference
//!
//! | Type | Description |
//! |------|-------------|
//! | [`BoundedMap`] | Fixed-capacity LRU map, single-threaded |
//! | [`ConcurrentBoundedMap`] | `BoundedMap` behind one lock |
//! | [`LookupCache`] | Cache in front of one lookup table |
//! | [`Registry`] | Bulk clear / disable / enable / reload across caches |
//! | [`MemoryStore`](memory::MemoryStore) | In-process [`LookupStore`] |
//!
//! ## Bounded Map
//!
//! ```
//! use lookup_cache::BoundedMap;
//! use std::num::NonZeroUsize;
//!
//! let mut map = BoundedMap::new(NonZeroUsize::new(2).unwrap());
//! map.put("apple", 1);
//! map.put("banana", 2);
//! map.get(&"apple");
//! map.put("cherry", 3);
//!
//! assert_eq!(map.get(&"banana"), None);
//! assert_eq!(map.keys(), vec!["apple", "cherry"]);
//! ```
//!
//! ## Modules
//!
//! - [`bounded`]: Single-threaded LRU map
//! - [`concurrent`]: Thread-safe LRU map
//! - [`lookup`]: Lookup cache and its fetch protocol
//! - [`registry`]: Registry of live caches
//! - [`store`]: Persistence collaborator traits
//! - [`memory`]: In-memory store
//! - [`schema`]: Table description, keys and values
//! - [`config`]: Configuration structures
//! - [`metrics`]: Counters and reporting
//! - [`error`]: Error types

/// Doubly linked list with in-place reordering.
///
/// **Note**: This module is internal infrastructure. It exposes raw pointer
/// operations that require careful invariant maintenance. Use [`BoundedMap`]
/// instead.
pub(crate) mod list;

/// Least Recently Used bounded map.
pub mod bounded;

/// Thread-safe bounded map.
pub mod concurrent;

/// Configuration structures.
pub mod config;

/// Error types.
pub mod error;

/// Lookup cache.
pub mod lookup;

/// In-memory store.
pub mod memory;

/// Cache metrics system.
///
/// Counters for bounded maps and lookup caches, reported through a common
/// trait.
pub mod metrics;

/// Registry of live caches.
pub mod registry;

/// Table description, keys and values.
pub mod schema;

/// Persistence collaborator traits.
pub mod store;

pub use bounded::BoundedMap;
pub use concurrent::ConcurrentBoundedMap;
pub use config::{BoundedMapConfig, CacheMode, LookupConfig};
pub use error::{LookupError, Result, StoreError};
pub use lookup::{Created, HasSchema, LookupCache};
pub use metrics::{CacheMetrics, LookupStats};
pub use registry::{Lifecycle, Registry};
pub use schema::{Key, KeyType, Schema, Value};
pub use store::{LookupStore, Record};
