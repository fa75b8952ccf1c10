//! Configuration for the bounded LRU maps.
//!
//! # Examples
//!
//! ```
//! use lookup_cache::config::BoundedMapConfig;
//! use lookup_cache::BoundedMap;
//! use std::num::NonZeroUsize;
//!
//! let config = BoundedMapConfig {
//!     capacity: NonZeroUsize::new(1000).unwrap(),
//! };
//! let map: BoundedMap<String, i32> = BoundedMap::init(config, None);
//! assert_eq!(map.capacity().get(), 1000);
//! ```

use std::fmt;
use std::num::NonZeroUsize;

/// Configuration for a [`BoundedMap`](crate::BoundedMap) or
/// [`ConcurrentBoundedMap`](crate::ConcurrentBoundedMap).
///
/// # Fields
///
/// - `capacity`: Maximum number of entries. The map never holds more after
///   a mutating call returns.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BoundedMapConfig {
    /// Maximum number of key-value pairs the map can hold.
    pub capacity: NonZeroUsize,
}

impl fmt::Debug for BoundedMapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedMapConfig")
            .field("capacity", &self.capacity)
            .finish()
    }
}
