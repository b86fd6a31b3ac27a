use chrono::{DateTime, Utc};

use strata_proto::{EntityId, FieldCell, Value};

/// One entry of a `read` or `write` batch. The store mutates the request in
/// place: on success the payload and bookkeeping are populated and `success`
/// is set; a failed entry is logged and left unsuccessful without aborting
/// the rest of the batch.
#[derive(Debug, Clone)]
pub struct FieldRequest {
    pub entity_id: EntityId,
    /// Field name, possibly an indirected path (`a->b->field`).
    pub field: String,
    /// For writes: the payload, or `None` to write the declared zero value.
    /// After either operation: the cell's value.
    pub value: Option<Value>,
    pub write_time: Option<DateTime<Utc>>,
    pub writer_id: Option<String>,
    pub success: bool,
}

impl FieldRequest {
    pub fn new(entity_id: EntityId, field: impl Into<String>) -> Self {
        Self { entity_id, field: field.into(), value: None, write_time: None, writer_id: None, success: false }
    }

    pub fn with_value(entity_id: EntityId, field: impl Into<String>, value: Value) -> Self {
        Self { value: Some(value), ..Self::new(entity_id, field) }
    }

    pub(crate) fn load(&mut self, cell: FieldCell) {
        self.value = Some(cell.value);
        self.write_time = Some(cell.write_time);
        self.writer_id = Some(cell.writer_id);
    }
}
