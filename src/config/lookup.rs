//! Configuration for a lookup cache.
//!
//! A lookup cache is configured per lookup field. The options interact:
//!
//! | `cache` | read-through | `find_or_create` | `find: Some(false)` |
//! |---------|--------------|------------------|---------------------|
//! | `Passthrough` | always | allowed | ignored |
//! | `Full` | only if `find` or `find_or_create` | rejected | allowed |
//! | `Bounded(n)` | always | allowed | rejected |
//!
//! `raise_on_miss` and `find_or_create` cannot be combined: a cache cannot
//! both create every missing value and fail on a missing value.

use crate::error::{LookupError, Result};
use crate::schema::Schema;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Normalization applied to field values before they are used as keys.
pub type Normalizer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// How much of the table is held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// No cache. Every fetch reads the store.
    Passthrough,
    /// The whole table, loaded eagerly and never evicted.
    Full,
    /// The `n` most recently used records.
    Bounded(NonZeroUsize),
}

impl CacheMode {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            CacheMode::Passthrough => "passthrough",
            CacheMode::Full => "full",
            CacheMode::Bounded(_) => "bounded",
        }
    }
}

/// Options for one lookup field.
///
/// # Fields
///
/// - `field`: Column holding the human-readable value.
/// - `order`: Column used to order a full load. Defaults to `field`.
/// - `cache`: See [`CacheMode`].
/// - `find`: Read the store on a cache miss. `None` takes the mode's default.
/// - `find_or_create`: Create a record when the value is missing everywhere.
///   Implies read-through.
/// - `allow_blank`: Treat `""` as a real lookup value instead of "no value".
/// - `normalize`: Applied to non-primary-key lookups before the cache and
///   store see them.
/// - `raise_on_miss`: Fail with [`LookupError::RecordNotFound`] instead of
///   returning nothing.
/// - `safe`: Guard a bounded cache with a blocking lock. Defaults to true.
/// - `bypass_cache_for_writes`: Start a bounded `find_or_create` cache in the
///   testing state, where the cache is neither read nor written.
#[derive(Clone)]
pub struct LookupConfig {
    /// Lookup column
    pub field: String,
    /// Column used to order a full load
    pub order: Option<String>,
    /// Cache mode
    pub cache: CacheMode,
    /// Explicit read-through setting
    pub find: Option<bool>,
    /// Create missing values
    pub find_or_create: bool,
    /// Accept the empty string as a lookup value
    pub allow_blank: bool,
    /// Value normalization
    pub normalize: Option<Normalizer>,
    /// Fail on a total miss
    pub raise_on_miss: bool,
    /// Use the blocking, thread-safe bounded map
    pub safe: bool,
    /// Start in the cache-bypassing testing state
    pub bypass_cache_for_writes: bool,
}

impl LookupConfig {
    /// Default options for a passthrough lookup on `field`.
    pub fn for_field(field: impl Into<String>) -> Self {
        LookupConfig {
            field: field.into(),
            order: None,
            cache: CacheMode::Passthrough,
            find: None,
            find_or_create: false,
            allow_blank: false,
            normalize: None,
            raise_on_miss: false,
            safe: true,
            bypass_cache_for_writes: false,
        }
    }

    /// Validates the options against `schema` and settles the defaults.
    pub(crate) fn resolve(&self, schema: &Schema) -> Result<ResolvedOptions> {
        if !schema.has_column(&self.field) {
            return Err(LookupError::UnknownAttribute {
                table: schema.table.clone(),
                field: self.field.clone(),
            });
        }
        let order = self.order.clone().unwrap_or_else(|| self.field.clone());
        if !schema.has_column(&order) {
            return Err(LookupError::UnknownAttribute {
                table: schema.table.clone(),
                field: order,
            });
        }

        let invalid = |reason: &str| LookupError::Configuration {
            table: schema.table.clone(),
            field: self.field.clone(),
            reason: reason.to_string(),
        };

        let write = self.find_or_create;
        let read = match self.cache {
            CacheMode::Full => {
                if write {
                    return Err(invalid(
                        "a full cache cannot find_or_create; use a bounded cache",
                    ));
                }
                self.find.unwrap_or(false)
            }
            CacheMode::Bounded(_) => {
                if self.find == Some(false) {
                    return Err(invalid("a bounded cache always reads through"));
                }
                true
            }
            CacheMode::Passthrough => true,
        };

        if write && self.raise_on_miss {
            return Err(invalid("raise_on_miss and find_or_create cannot be combined"));
        }

        let testing =
            matches!(self.cache, CacheMode::Bounded(_)) && write && self.bypass_cache_for_writes;

        Ok(ResolvedOptions {
            order,
            read,
            write,
            testing,
        })
    }
}

impl fmt::Debug for LookupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupConfig")
            .field("field", &self.field)
            .field("order", &self.order)
            .field("cache", &self.cache)
            .field("find", &self.find)
            .field("find_or_create", &self.find_or_create)
            .field("allow_blank", &self.allow_blank)
            .field("normalize", &self.normalize.is_some())
            .field("raise_on_miss", &self.raise_on_miss)
            .field("safe", &self.safe)
            .field("bypass_cache_for_writes", &self.bypass_cache_for_writes)
            .finish()
    }
}

/// Options after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedOptions {
    pub order: String,
    pub read: bool,
    pub write: bool,
    pub testing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::KeyType;

    fn schema() -> Schema {
        Schema::lookup_table("states", "state", KeyType::Integer)
    }

    fn bounded(n: usize) -> CacheMode {
        CacheMode::Bounded(NonZeroUsize::new(n).unwrap())
    }

    #[test]
    fn test_passthrough_defaults() {
        let config = LookupConfig::for_field("state");
        let resolved = config.resolve(&schema()).unwrap();
        assert_eq!(resolved.order, "state");
        assert!(resolved.read);
        assert!(!resolved.write);
        assert!(config.safe);
    }

    #[test]
    fn test_full_cache_read_through_is_opt_in() {
        let config = LookupConfig {
            cache: CacheMode::Full,
            ..LookupConfig::for_field("state")
        };
        assert!(!config.resolve(&schema()).unwrap().read);

        let config = LookupConfig {
            cache: CacheMode::Full,
            find: Some(true),
            ..LookupConfig::for_field("state")
        };
        assert!(config.resolve(&schema()).unwrap().read);
    }

    #[test]
    fn test_full_cache_rejects_find_or_create() {
        let config = LookupConfig {
            cache: CacheMode::Full,
            find_or_create: true,
            ..LookupConfig::for_field("state")
        };
        assert!(matches!(
            config.resolve(&schema()),
            Err(LookupError::Configuration { .. })
        ));
    }

    #[test]
    fn test_bounded_cache_rejects_find_false() {
        let config = LookupConfig {
            cache: bounded(5),
            find: Some(false),
            ..LookupConfig::for_field("state")
        };
        assert!(matches!(
            config.resolve(&schema()),
            Err(LookupError::Configuration { .. })
        ));
    }

    #[test]
    fn test_raise_and_create_conflict() {
        let config = LookupConfig {
            find_or_create: true,
            raise_on_miss: true,
            ..LookupConfig::for_field("state")
        };
        let err = config.resolve(&schema()).unwrap_err();
        assert!(err.to_string().contains("raise_on_miss"));
    }

    #[test]
    fn test_unknown_field_and_order() {
        let config = LookupConfig::for_field("name");
        assert!(matches!(
            config.resolve(&schema()),
            Err(LookupError::UnknownAttribute { .. })
        ));

        let config = LookupConfig {
            order: Some("position".to_string()),
            ..LookupConfig::for_field("state")
        };
        assert!(matches!(
            config.resolve(&schema()),
            Err(LookupError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_bypass_only_applies_to_bounded_writes() {
        let config = LookupConfig {
            cache: bounded(2),
            find_or_create: true,
            bypass_cache_for_writes: true,
            ..LookupConfig::for_field("state")
        };
        assert!(config.resolve(&schema()).unwrap().testing);

        let config = LookupConfig {
            bypass_cache_for_writes: true,
            ..LookupConfig::for_field("state")
        };
        assert!(!config.resolve(&schema()).unwrap().testing);
    }

    #[test]
    fn test_debug_hides_normalizer() {
        let config = LookupConfig {
            normalize: Some(Arc::new(|v: &str| v.trim().to_string())),
            ..LookupConfig::for_field("state")
        };
        assert!(format!("{:?}", config).contains("normalize: true"));
    }
}
