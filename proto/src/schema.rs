use serde::{Deserialize, Serialize};

use crate::value::ValueType;

/// Declares an entity type: its name and the ordered field names every
/// instance of the type carries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EntitySchema {
    pub name: String,
    pub fields: Vec<String>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { name: name.into(), fields: fields.into_iter().map(Into::into).collect() }
    }

    pub fn has_field(&self, field: &str) -> bool { self.fields.iter().any(|f| f == field) }
}

/// Declares a field's value type. The type fully determines how a stored
/// payload decodes and what the cell's zero value is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub value_type: ValueType,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self { Self { name: name.into(), value_type } }
}
