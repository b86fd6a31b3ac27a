use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity_id::EntityId;
use crate::value::Value;

/// One entity instance. Parent and children links form a forest; children
/// keep insertion order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub entity_type: String,
    pub name: String,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
}

/// The persistent slot for one declared field of one entity: the typed
/// payload plus write bookkeeping. Also the snapshot shape notifications
/// carry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FieldCell {
    pub entity_id: EntityId,
    pub field: String,
    pub value: Value,
    pub write_time: DateTime<Utc>,
    pub writer_id: String,
}
