//! Configuration Module
//!
//! Configuration structures for the bounded maps and the lookup caches. Each
//! component has its own struct with public fields.
//!
//! # Design Philosophy
//!
//! Configuration structs have all public fields for simple instantiation:
//!
//! - **Simple**: Create the struct with every field set, or start from a
//!   constructor such as [`LookupConfig::for_field`] and override fields with
//!   struct update syntax
//! - **Checked once**: Combinations of options are validated when the
//!   component is built, never on each call
//!
//! # Configs
//!
//! | Config | Component | Description |
//! |--------|-----------|-------------|
//! | `BoundedMapConfig` | [`BoundedMap`](crate::BoundedMap), [`ConcurrentBoundedMap`](crate::ConcurrentBoundedMap) | LRU capacity |
//! | `LookupConfig` | [`LookupCache`](crate::LookupCache) | Cache mode and miss handling for one lookup field |
//!
//! # Examples
//!
//! ```
//! use lookup_cache::config::{CacheMode, LookupConfig};
//! use std::num::NonZeroUsize;
//!
//! // Keep the 20 most recently used user agents, creating unknown ones
//! let config = LookupConfig {
//!     cache: CacheMode::Bounded(NonZeroUsize::new(20).unwrap()),
//!     find_or_create: true,
//!     ..LookupConfig::for_field("user_agent")
//! };
//! assert!(config.safe);
//! ```

pub mod bounded;
pub mod lookup;

pub use bounded::BoundedMapConfig;
pub use lookup::{CacheMode, LookupConfig, Normalizer};
