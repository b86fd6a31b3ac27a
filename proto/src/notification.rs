use serde::{Deserialize, Serialize};

use crate::entity::FieldCell;
use crate::entity_id::EntityId;

/// What a subscriber asked to observe. The canonical encoding of this record
/// is the subscription token: identical configs collapse to one subscription.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SubscriptionConfig {
    /// Entity-scoped target. When absent, `entity_type` scopes the
    /// subscription to every entity of the type.
    pub entity_id: Option<EntityId>,
    pub entity_type: String,
    pub field: String,
    /// Drop writes whose serialized value is byte-identical to the stored one.
    pub notify_on_change: bool,
    /// Extra fields of the written entity snapshotted at trigger time.
    pub context_fields: Vec<String>,
    pub service_id: String,
}

/// One delivered field change.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub token: String,
    pub current: FieldCell,
    /// Absent on the first write to a cell that never existed.
    pub previous: Option<FieldCell>,
    pub context: Vec<FieldCell>,
}
