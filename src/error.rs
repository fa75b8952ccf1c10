//! Error types.
//!
//! [`LookupError`] is what callers of this crate see. [`StoreError`] is what a
//! [`LookupStore`](crate::store::LookupStore) reports; it converts into
//! `LookupError::Store` unless the cache recovers from it (a uniqueness
//! conflict during write-on-miss or seeding is answered with a re-read).

use crate::schema::Value;
use thiserror::Error;

/// Crate result type.
pub type Result<T, E = LookupError> = std::result::Result<T, E>;

/// Errors raised by bounded maps, lookup caches and the registry.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Incompatible construction options. Surfaced at setup, never retried.
    #[error("`{table}` lookup on `{field}`: {reason}")]
    Configuration {
        /// Backing table
        table: String,
        /// Lookup field
        field: String,
        /// What is wrong with the options
        reason: String,
    },

    /// The lookup field is not a column of the backing table.
    #[error("unknown attribute \"{field}\" for <{table}>")]
    UnknownAttribute {
        /// Backing table
        table: String,
        /// Requested field
        field: String,
    },

    /// A call argument is out of range (e.g. a zero capacity).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The lookup key has a shape the cache cannot route.
    #[error("{table}[arg]: arg must be a string, integer, null or {table} record, got {kind}")]
    UnsupportedKey {
        /// Backing table
        table: String,
        /// Kind of value received
        kind: &'static str,
    },

    /// A strict cache found no record in the cache or the store.
    #[error("no {table} lookup record found for value: {value}")]
    RecordNotFound {
        /// Backing table
        table: String,
        /// The requested (normalized) value
        value: Value,
    },

    /// A destructive operation was attempted on a table with an active cache.
    #[error("{table}.{operation} is not supported on cached lookup tables")]
    Unsupported {
        /// Backing table
        table: String,
        /// Rejected operation
        operation: String,
    },

    /// A store failure the cache does not recover from.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures reported by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// An insert hit a unique constraint.
    #[error("duplicate value {value} for {table}.{column}")]
    UniqueViolation {
        /// Table written to
        table: String,
        /// Constrained column
        column: String,
        /// Conflicting value
        value: Value,
    },

    /// The record failed validation and was not persisted.
    #[error("validation failed: {}", messages.join(", "))]
    Invalid {
        /// Human readable validation messages
        messages: Vec<String>,
    },

    /// Any other backend failure (connection loss, bad SQL, ...).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true for a unique-constraint conflict.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}
