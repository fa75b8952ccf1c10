//! Table schema and key types.
//!
//! A lookup table is described by a [`Schema`]: its name, primary key column
//! and type, and column list. Values flowing between callers, the cache and
//! the store are [`Value`]s; primary keys resident in the cache are [`Key`]s.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::net::IpAddr;

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A[[:xdigit:]]{8}-[[:xdigit:]]{4}-[[:xdigit:]]{4}-[[:xdigit:]]{4}-[[:xdigit:]]{12}\z")
        .expect("UUID pattern is a valid regex")
});

/// Returns true when `text` has the 8-4-4-4-12 hexadecimal UUID shape.
pub fn is_uuid(text: &str) -> bool {
    UUID_PATTERN.is_match(text)
}

/// Storage type of a table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Integer (serial / smallserial) keys
    Integer,
    /// Native UUID keys
    Uuid,
    /// String keys in UUID format
    String,
}

impl KeyType {
    /// Returns true when `value` has the shape of a primary key of this type.
    ///
    /// Integer keys match integer values; UUID and string keys match text in
    /// UUID format. Anything else is routed to the lookup field.
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (KeyType::Integer, Value::Int(_)) => true,
            (KeyType::Uuid | KeyType::String, Value::Text(text)) => is_uuid(text),
            _ => false,
        }
    }
}

/// A primary key as held in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Integer primary key
    Int(i64),
    /// UUID or string primary key
    Text(String),
}

impl Key {
    /// Converts the key to a column value for store queries.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Int(id) => Value::Int(*id),
            Key::Text(id) => Value::Text(id.clone()),
        }
    }

    /// Builds a key from a primary-key-shaped value.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Int(id) => Some(Key::Int(*id)),
            Value::Text(id) => Some(Key::Text(id.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(id) => write!(f, "{id}"),
            Key::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for Key {
    fn from(id: i64) -> Self {
        Key::Int(id)
    }
}

impl From<&str> for Key {
    fn from(id: &str) -> Self {
        Key::Text(id.to_string())
    }
}

/// A column value or lookup argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL / no value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text
    Text(String),
}

impl Value {
    /// Name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "string",
        }
    }

    /// Returns the text if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value the way it is compared against the lookup field.
    pub fn to_field_text(&self) -> Option<String> {
        match self {
            Value::Text(text) => Some(text.clone()),
            Value::Int(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(text) => write!(f, "{text:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&String> for Value {
    fn from(text: &String) -> Self {
        Value::Text(text.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<IpAddr> for Value {
    fn from(ip: IpAddr) -> Self {
        Value::Text(ip.to_string())
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        key.to_value()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Description of a lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Table name, used in log lines and error messages
    pub table: String,
    /// Primary key column
    pub primary_key: String,
    /// Primary key storage type
    pub key_type: KeyType,
    /// All column names, primary key included
    pub columns: Vec<String>,
}

impl Schema {
    /// Conventional lookup table: `<singular>_id` integer key plus one text
    /// column named after the singular.
    pub fn lookup_table(table: &str, singular: &str, key_type: KeyType) -> Self {
        let primary_key = format!("{singular}_id");
        Schema {
            table: table.to_string(),
            columns: vec![primary_key.clone(), singular.to_string()],
            primary_key,
            key_type,
        }
    }

    /// Returns true if `column` exists on the table.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Returns true when `value` would be routed to the primary key.
    pub fn is_primary_key(&self, value: &Value) -> bool {
        self.key_type.matches(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_shape() {
        assert!(is_uuid("0b4e7a0e-5fe1-4f0b-9a5e-2c3b6d1e8f90"));
        assert!(is_uuid("0B4E7A0E-5FE1-4F0B-9A5E-2C3B6D1E8F90"));
        assert!(!is_uuid("0b4e7a0e5fe14f0b9a5e2c3b6d1e8f90"));
        assert!(!is_uuid("{0b4e7a0e-5fe1-4f0b-9a5e-2c3b6d1e8f90}"));
        assert!(!is_uuid("0b4e7a0e-5fe1-4f0b-9a5e-2c3b6d1e8f90\n"));
        assert!(!is_uuid("/"));
    }

    #[test]
    fn test_key_type_routing() {
        assert!(KeyType::Integer.matches(&Value::Int(3)));
        assert!(!KeyType::Integer.matches(&Value::from("3")));
        assert!(KeyType::Uuid.matches(&Value::from("0b4e7a0e-5fe1-4f0b-9a5e-2c3b6d1e8f90")));
        assert!(!KeyType::Uuid.matches(&Value::Int(3)));
        assert!(!KeyType::String.matches(&Value::from("AL")));
    }

    #[test]
    fn test_lookup_table_schema() {
        let schema = Schema::lookup_table("states", "state", KeyType::Integer);
        assert_eq!(schema.primary_key, "state_id");
        assert!(schema.has_column("state"));
        assert!(!schema.has_column("name"));
    }

    #[test]
    fn test_value_conversions() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(Value::from(ip), Value::from("127.0.0.1"));
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some(7)), Value::Int(7));
        assert_eq!(Value::from("AL").to_string(), "\"AL\"");
        assert_eq!(Value::Int(5).to_field_text().as_deref(), Some("5"));
        assert_eq!(Value::Float(1.0).kind(), "float");
    }
}
