//! The persistence collaborator.
//!
//! The cache never talks to a database directly. It is handed a
//! [`LookupStore`], which provides equality lookups, atomic inserts, ordered
//! scans and a transaction boundary. Tests substitute faulty or counting
//! stores through the same trait.

use crate::error::StoreError;
use crate::schema::{Key, Value};
use std::sync::Arc;

/// A row of a lookup table.
///
/// Records are treated as immutable snapshots once fetched: changes made in
/// the store are not visible through cached copies until the cache reloads.
pub trait Record: Clone + Send + Sync + 'static {
    /// Primary key of the row.
    fn id(&self) -> Key;

    /// Reads a column. Returns `None` for unknown columns.
    fn attribute(&self, column: &str) -> Option<Value>;

    /// The column's value as lookup-field text.
    fn field_text(&self, column: &str) -> Option<String> {
        self.attribute(column).and_then(|value| value.to_field_text())
    }
}

/// Storage operations the cache consumes.
pub trait LookupStore: Send + Sync {
    /// Row type of the table.
    type Record: Record;

    /// Equality lookup on a single column.
    fn find_by(&self, column: &str, value: &Value) -> Result<Option<Self::Record>, StoreError>;

    /// Inserts a row in its own ("requires new") transaction.
    ///
    /// Fails with [`StoreError::UniqueViolation`] when a unique constraint
    /// rejects the row and with [`StoreError::Invalid`] when validation does.
    fn create_atomic(&self, attributes: &[(&str, Value)]) -> Result<Self::Record, StoreError>;

    /// Every row of the table ordered by `order_by`.
    fn all_ordered(&self, order_by: &str) -> Result<Vec<Self::Record>, StoreError>;

    /// Runs `f` atomically: either all of its writes persist or none do.
    ///
    /// The default runs `f` without any isolation, which suits stores that
    /// cannot roll back.
    fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        f(self)
    }
}

impl<S: LookupStore> LookupStore for Arc<S> {
    type Record = S::Record;

    fn find_by(&self, column: &str, value: &Value) -> Result<Option<Self::Record>, StoreError> {
        (**self).find_by(column, value)
    }

    fn create_atomic(&self, attributes: &[(&str, Value)]) -> Result<Self::Record, StoreError> {
        (**self).create_atomic(attributes)
    }

    fn all_ordered(&self, order_by: &str) -> Result<Vec<Self::Record>, StoreError> {
        (**self).all_ordered(order_by)
    }

    fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        (**self).transaction(|_| f(self))
    }
}
