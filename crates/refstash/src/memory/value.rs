//! The value model every stored object is expressed in.
//!
//! Tool results arrive as JSON documents or as typed Rust structs. Both are
//! converted into [`Value`], a small tagged union, so that navigation and
//! rendering can dispatch exhaustively on shape: maps are looked up by key,
//! records by field name, sequences by index, and everything else is a leaf.

use super::error::{MemoryError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Sequence(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// An attribute-bearing object with a type name (a serialized struct).
    Record(Record),
}

/// A named record: the stored form of a typed struct.
///
/// Fields keep the order they were given in.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field (builder pattern).
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

/// The shape of a [`Value`], used to key custom renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    Text,
    Sequence,
    Map,
    Record,
}

impl ValueKind {
    pub fn label(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::Text => "str",
            ValueKind::Sequence => "list",
            ValueKind::Map => "map",
            ValueKind::Record => "record",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Sequence(_) => ValueKind::Sequence,
            Value::Map(_) => ValueKind::Map,
            Value::Record(_) => ValueKind::Record,
        }
    }

    /// Human-readable type name: the record's own type name, `int`/`float`
    /// for numbers, otherwise the kind label.
    pub fn type_name(&self) -> String {
        match self {
            Value::Record(record) => record.type_name.clone(),
            Value::Number(n) if n.is_f64() => "float".to_string(),
            Value::Number(_) => "int".to_string(),
            other => other.kind().label().to_string(),
        }
    }

    /// Number of items (sequence), characters (text), or entries
    /// (map/record). `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Text(s) => Some(s.chars().count()),
            Value::Sequence(items) => Some(items.len()),
            Value::Map(map) => Some(map.len()),
            Value::Record(record) => Some(record.fields.len()),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Text(_)
        )
    }

    /// Convert a JSON document. Objects become maps, never records.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert any serializable value. A struct (anything serializing to a
    /// JSON object that is not itself a map type) becomes a [`Record`] named
    /// after the Rust type.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let json =
            serde_json::to_value(value).map_err(|e| MemoryError::InvalidValue(e.to_string()))?;
        let type_name = short_type_name::<T>();
        match json {
            serde_json::Value::Object(map) if !is_map_type(&type_name) => Ok(Value::Record(Record {
                type_name,
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            })),
            other => Ok(Value::from_json(other)),
        }
    }

    /// Convert back to JSON. Records become plain objects.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Record(record) => serde_json::Value::Object(
                record
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Plain-text form: strings as-is, everything else as pretty JSON.
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => serde_json::to_string_pretty(&other.to_json()).unwrap_or_default(),
        }
    }
}

/// Smart pointers and `Option` are transparent: a record is named after
/// the type they hold.
const TRANSPARENT_WRAPPERS: &[&str] = &["Option", "Box", "Arc", "Rc"];

/// Last path component of a Rust type name, without generics or wrappers.
fn short_type_name<T: ?Sized>() -> String {
    let mut name = strip_reference(std::any::type_name::<T>());
    loop {
        let (head, generics) = name.split_once('<').unwrap_or((name, ""));
        let base = head.rsplit("::").next().unwrap_or(head);
        match generics.strip_suffix('>') {
            Some(inner) if TRANSPARENT_WRAPPERS.contains(&base) => {
                name = strip_reference(inner);
            }
            _ => return base.to_string(),
        }
    }
}

fn strip_reference(name: &str) -> &str {
    let name = name.trim_start_matches('&');
    name.strip_prefix("mut ").unwrap_or(name)
}

fn is_map_type(name: &str) -> bool {
    matches!(name, "HashMap" | "BTreeMap" | "Map" | "Value")
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number((n as u64).into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}
