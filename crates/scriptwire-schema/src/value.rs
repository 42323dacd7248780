use bytes::Bytes;
use scriptwire_wire::{Scalar, ScalarRef};

/// A runtime value for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(String),
    Bytes(Bytes),
    Array(Vec<Value>),
    Record(Record),
}

impl Value {
    /// Short description of the runtime kind, for mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            other => other.as_scalar().map(|s| s.kind()).unwrap_or("value"),
        }
    }

    /// Borrow as a primitive value; `None` for arrays and records.
    pub fn as_scalar(&self) -> Option<ScalarRef<'_>> {
        Some(match self {
            Value::Char(c) => ScalarRef::Char(*c),
            Value::Int(v) => ScalarRef::Int(*v),
            Value::UInt(v) => ScalarRef::UInt(*v),
            Value::Float(v) => ScalarRef::Float(*v),
            Value::Bool(v) => ScalarRef::Bool(*v),
            Value::String(s) => ScalarRef::Str(s),
            Value::Bytes(b) => ScalarRef::Bytes(b),
            Value::Array(_) | Value::Record(_) => return None,
        })
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Char(c) => Value::Char(c),
            Scalar::Int(v) => Value::Int(v),
            Scalar::UInt(v) => Value::UInt(v),
            Scalar::Float(v) => Value::Float(v),
            Scalar::Bool(v) => Value::Bool(v),
            Scalar::String(s) => Value::String(s),
            Scalar::Bytes(b) => Value::Bytes(b),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

/// Field values of one record, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl Record {
    /// Named record from `(key, value)` pairs.
    pub fn named<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Record::Named(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Positional record from values.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Record::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Record::Positional(values) => values.len(),
            Record::Named(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a named field. Always `None` for positional records.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Record::Positional(_) => None,
            Record::Named(entries) => entries.iter().find(|(k, _)| k == name).map(|(_, v)| v),
        }
    }

    /// Value at a declaration position.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Record::Positional(values) => values.get(index),
            Record::Named(entries) => entries.get(index).map(|(_, v)| v),
        }
    }
}
