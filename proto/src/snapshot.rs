use serde::{Deserialize, Serialize};

use crate::entity::{Entity, FieldCell};
use crate::schema::{EntitySchema, FieldSchema};

/// In-memory aggregate of the whole store: both schema spaces, every entity
/// record, and every field cell. Built by a non-atomic walk; see
/// `EntityStore::snapshot` for the consistency caveat.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub entity_schemas: Vec<EntitySchema>,
    pub field_schemas: Vec<FieldSchema>,
    pub entities: Vec<Entity>,
    pub fields: Vec<FieldCell>,
}
