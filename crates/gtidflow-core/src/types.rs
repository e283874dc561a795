use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A typed column value inside a change record.
///
/// The wire form carries no type tags. Variant order matters for decoding:
/// an RFC 3339 string comes back as a `Timestamp`, any other string as
/// `Text`. Decoding is therefore lossy for text columns whose content is
/// itself an RFC 3339 timestamp; consumers that need the column type should
/// take it from the table schema, not from the decoded variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
    Raw(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }
}

impl From<RawValue> for Value {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Null => Value::Null,
            RawValue::Int(i) => Value::Integer(i),
            RawValue::UInt(u) => match i64::try_from(u) {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::Text(u.to_string()),
            },
            RawValue::Float(f) => Value::Float(f),
            RawValue::Text(s) => Value::Text(s),
            RawValue::Bytes(b) => Value::Raw(b),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// A positional cell value as delivered by the replication stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

/// A row keyed by column name, in table column order.
pub type RowMap = IndexMap<String, Value>;
