//! In-memory lookup store.
//!
//! [`MemoryStore`] implements [`LookupStore`] over a `Vec` of rows behind a
//! mutex. It enforces unique and required columns, generates integer or
//! UUID primary keys, rolls back failed transactions and counts the calls
//! made against it, which makes it a convenient collaborator for tests and
//! benchmarks.

use crate::error::StoreError;
use crate::lookup::HasSchema;
use crate::schema::{Key, KeyType, Schema, Value};
use crate::store::{LookupStore, Record};
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use uuid::Uuid;

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

/// A row of a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    id: Key,
    attributes: BTreeMap<String, Value>,
}

impl MemoryRecord {
    /// Primary key of the row.
    pub fn id(&self) -> Key {
        self.id.clone()
    }

    /// Borrowed column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    /// Column value if it is text.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_text)
    }
}

impl Record for MemoryRecord {
    fn id(&self) -> Key {
        self.id.clone()
    }

    fn attribute(&self, column: &str) -> Option<Value> {
        self.attributes.get(column).cloned()
    }
}

#[derive(Debug)]
struct Rows {
    records: Vec<MemoryRecord>,
    next_id: i64,
    // keys inserted by each thread's open transaction
    journals: HashMap<ThreadId, Vec<Key>>,
}

/// An in-process table with unique constraints.
#[derive(Debug)]
pub struct MemoryStore {
    schema: Schema,
    unique: Vec<String>,
    required: Vec<String>,
    rows: Mutex<Rows>,
    find_calls: AtomicUsize,
    create_calls: AtomicUsize,
    scan_calls: AtomicUsize,
}

impl MemoryStore {
    /// Empty table with no constraints beyond a unique primary key.
    pub fn new(schema: Schema) -> Self {
        MemoryStore {
            schema,
            unique: Vec::new(),
            required: Vec::new(),
            rows: Mutex::new(Rows {
                records: Vec::new(),
                next_id: 1,
                journals: HashMap::new(),
            }),
            find_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            scan_calls: AtomicUsize::new(0),
        }
    }

    /// Conventional lookup table whose `singular` column is required and
    /// unique. See [`Schema::lookup_table`].
    pub fn lookup_table(table: &str, singular: &str, key_type: KeyType) -> Self {
        Self::new(Schema::lookup_table(table, singular, key_type))
            .with_unique(singular)
            .with_required(singular)
    }

    /// Adds a unique constraint on `column`. Nulls never conflict.
    pub fn with_unique(mut self, column: &str) -> Self {
        self.unique.push(column.to_string());
        self
    }

    /// Rejects rows whose `column` is null or blank.
    pub fn with_required(mut self, column: &str) -> Self {
        self.required.push(column.to_string());
        self
    }

    /// Inserts a row directly, without counting it as a create call.
    pub fn insert(&self, attributes: &[(&str, Value)]) -> Result<MemoryRecord, StoreError> {
        let mut rows = self.rows.lock();
        self.insert_row(&mut rows, attributes)
    }

    /// Overwrites one column of the row with primary key `id`.
    ///
    /// Returns false when no such row exists.
    pub fn update(&self, id: &Key, column: &str, value: Value) -> Result<bool, StoreError> {
        self.check_column(column)?;
        let mut rows = self.rows.lock();

        if self.unique.iter().any(|c| c == column) && !value.is_null() {
            let taken = rows
                .records
                .iter()
                .any(|r| &r.id != id && r.attributes.get(column) == Some(&value));
            if taken {
                return Err(self.unique_violation(column, value));
            }
        }

        match rows.records.iter_mut().find(|r| &r.id == id) {
            Some(record) => {
                record.attributes.insert(column.to_string(), value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deletes the row with primary key `id`. Returns false if absent.
    pub fn delete(&self, id: &Key) -> bool {
        let mut rows = self.rows.lock();
        let before = rows.records.len();
        rows.records.retain(|r| &r.id != id);
        rows.records.len() != before
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.lock().records.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every row, in insertion order.
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.rows.lock().records.clone()
    }

    /// Calls made to `find_by`.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Calls made to `create_atomic`, successful or not.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Calls made to `all_ordered`.
    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    fn check_column(&self, column: &str) -> Result<(), StoreError> {
        if self.schema.has_column(column) {
            Ok(())
        } else {
            Err(StoreError::Backend(format!(
                "column {}.{} does not exist",
                self.schema.table, column
            )))
        }
    }

    fn unique_violation(&self, column: &str, value: Value) -> StoreError {
        StoreError::UniqueViolation {
            table: self.schema.table.clone(),
            column: column.to_string(),
            value,
        }
    }

    fn insert_row(
        &self,
        rows: &mut Rows,
        attributes: &[(&str, Value)],
    ) -> Result<MemoryRecord, StoreError> {
        let mut values = BTreeMap::new();
        for (column, value) in attributes {
            self.check_column(column)?;
            values.insert(column.to_string(), value.clone());
        }

        let messages: Vec<String> = self
            .required
            .iter()
            .filter(|column| values.get(column.as_str()).map_or(true, is_blank))
            .map(|column| format!("{column} can't be blank"))
            .collect();
        if !messages.is_empty() {
            return Err(StoreError::Invalid { messages });
        }

        let primary_key = self.schema.primary_key.as_str();
        let id = match values.get(primary_key) {
            Some(value) => Key::from_value(value).ok_or_else(|| {
                StoreError::Backend(format!("{value} is not a valid primary key"))
            })?,
            None => match self.schema.key_type {
                KeyType::Integer => Key::Int(rows.next_id),
                KeyType::Uuid | KeyType::String => Key::Text(Uuid::new_v4().to_string()),
            },
        };

        if rows.records.iter().any(|r| r.id == id) {
            return Err(self.unique_violation(primary_key, id.to_value()));
        }
        for column in &self.unique {
            if let Some(value) = values.get(column).filter(|v| !v.is_null()) {
                if rows.records.iter().any(|r| r.attributes.get(column) == Some(value)) {
                    return Err(self.unique_violation(column, value.clone()));
                }
            }
        }

        if let Key::Int(n) = id {
            rows.next_id = rows.next_id.max(n.saturating_add(1));
        }
        values.insert(primary_key.to_string(), id.to_value());

        if let Some(journal) = rows.journals.get_mut(&thread::current().id()) {
            journal.push(id.clone());
        }
        let record = MemoryRecord { id, attributes: values };
        rows.records.push(record.clone());
        Ok(record)
    }
}

impl LookupStore for MemoryStore {
    type Record = MemoryRecord;

    fn find_by(&self, column: &str, value: &Value) -> Result<Option<MemoryRecord>, StoreError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.check_column(column)?;
        if value.is_null() {
            return Ok(None);
        }
        let rows = self.rows.lock();
        Ok(rows
            .records
            .iter()
            .find(|r| r.attributes.get(column) == Some(value))
            .cloned())
    }

    fn create_atomic(&self, attributes: &[(&str, Value)]) -> Result<MemoryRecord, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock();
        self.insert_row(&mut rows, attributes)
    }

    fn all_ordered(&self, order_by: &str) -> Result<Vec<MemoryRecord>, StoreError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        self.check_column(order_by)?;
        let mut records = self.records();
        records.sort_by(|a, b| compare(a.get(order_by), b.get(order_by)));
        Ok(records)
    }

    /// Removes the rows `f` inserted if it fails.
    ///
    /// Only inserts made on the calling thread are undone; rows committed by
    /// other threads meanwhile survive, and updates or deletes made by `f`
    /// are not reverted. A nested transaction joins the outer one.
    fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        let me = thread::current().id();
        let nested = {
            let mut rows = self.rows.lock();
            let nested = rows.journals.contains_key(&me);
            if !nested {
                rows.journals.insert(me, Vec::new());
            }
            nested
        };
        if nested {
            return f(self);
        }

        let result = f(self);
        let mut rows = self.rows.lock();
        let inserted = rows.journals.remove(&me).unwrap_or_default();
        if result.is_err() && !inserted.is_empty() {
            rows.records.retain(|r| !inserted.contains(&r.id));
        }
        result
    }
}

impl HasSchema for MemoryStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(text) => text.trim().is_empty(),
        _ => false,
    }
}

// Nulls sort first, then by type, then by value.
fn compare(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Int(_)) | Some(Value::Float(_)) => 2,
            Some(Value::Text(_)) => 3,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Int(x)), Some(Value::Int(y))) => x.cmp(y),
        (Some(Value::Int(x)), Some(Value::Float(y))) => (*x as f64).total_cmp(y),
        (Some(Value::Float(x)), Some(Value::Int(y))) => x.total_cmp(&(*y as f64)),
        (Some(Value::Float(x)), Some(Value::Float(y))) => x.total_cmp(y),
        (Some(Value::Text(x)), Some(Value::Text(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
