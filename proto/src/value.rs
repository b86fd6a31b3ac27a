use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;

use crate::entity_id::EntityId;
use crate::error::DecodeError;

/// A typed field payload. Every stored value is one of these variants; the
/// variant's type URL is the schema-level discriminator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    EntityReference(EntityId),
    BinaryFile(Vec<u8>),
    Choice(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    Timestamp,
    EntityReference,
    BinaryFile,
    Choice,
}

impl ValueType {
    pub fn of(v: &Value) -> Self {
        match v {
            Value::String(_) => ValueType::String,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Bool,
            Value::Timestamp(_) => ValueType::Timestamp,
            Value::EntityReference(_) => ValueType::EntityReference,
            Value::BinaryFile(_) => ValueType::BinaryFile,
            Value::Choice(_) => ValueType::Choice,
        }
    }

    /// The stable string naming this type on the wire and in field schemas.
    pub fn url(&self) -> &'static str {
        match self {
            ValueType::String => "strata.String",
            ValueType::Int => "strata.Int",
            ValueType::Float => "strata.Float",
            ValueType::Bool => "strata.Bool",
            ValueType::Timestamp => "strata.Timestamp",
            ValueType::EntityReference => "strata.EntityReference",
            ValueType::BinaryFile => "strata.BinaryFile",
            ValueType::Choice => "strata.Choice",
        }
    }

    pub fn from_url(url: &str) -> Result<Self, DecodeError> {
        Ok(match url {
            "strata.String" => ValueType::String,
            "strata.Int" => ValueType::Int,
            "strata.Float" => ValueType::Float,
            "strata.Bool" => ValueType::Bool,
            "strata.Timestamp" => ValueType::Timestamp,
            "strata.EntityReference" => ValueType::EntityReference,
            "strata.BinaryFile" => ValueType::BinaryFile,
            "strata.Choice" => ValueType::Choice,
            other => return Err(DecodeError::UnknownTypeUrl(other.to_string())),
        })
    }

    /// The value a freshly created field cell holds until the first write.
    pub fn zero(&self) -> Value {
        match self {
            ValueType::String => Value::String(String::new()),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Bool => Value::Bool(false),
            ValueType::Timestamp => Value::Timestamp(Utc.timestamp_opt(0, 0).unwrap()),
            ValueType::EntityReference => Value::EntityReference(EntityId::nil()),
            ValueType::BinaryFile => Value::BinaryFile(Vec::new()),
            ValueType::Choice => Value::Choice(0),
        }
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType { ValueType::of(self) }

    /// Natural per-type ordering: lexicographic strings, numeric ints and
    /// floats, epoch ordering for timestamps, false < true, references and
    /// choices by raw value. Mismatched variants do not compare.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.timestamp_millis().cmp(&b.timestamp_millis())),
            (Value::EntityReference(a), Value::EntityReference(b)) => Some(a.cmp(b)),
            (Value::BinaryFile(a), Value::BinaryFile(b)) => Some(a.cmp(b)),
            (Value::Choice(a), Value::Choice(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Value::EntityReference(id) => write!(f, "{}", id),
            Value::BinaryFile(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::Choice(i) => write!(f, "choice:{}", i),
        }
    }
}
