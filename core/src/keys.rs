//! Backend key space.
//!
//! schema:entity:<type>                                -> EntitySchema
//! schema:field:<name>                                 -> FieldSchema
//! instance:entity:<entityId>                          -> Entity
//! instance:field:<name>:<entityId>                    -> FieldCell
//! instance:type:<type>                                -> set of entity ids
//! instance:notification-config:<idOrType>:<field>     -> set of encoded configs
//! instance:notification:<token>                       -> notification stream
//! leader:<app>:current                                -> lease (instance id)
//! leader:<app>:candidates:<instanceId>                -> candidate beacon
//! log:<app>                                           -> log record stream
//! lock:<name>                                         -> distributed lock token

use strata_proto::EntityId;

pub struct KeySpace;

impl KeySpace {
    pub fn entity_schema(entity_type: &str) -> String { format!("schema:entity:{entity_type}") }

    pub fn field_schema(field: &str) -> String { format!("schema:field:{field}") }

    pub fn entity(id: &EntityId) -> String { format!("instance:entity:{id}") }

    pub fn field(field: &str, id: &EntityId) -> String { format!("instance:field:{field}:{id}") }

    pub fn entity_type(entity_type: &str) -> String { format!("instance:type:{entity_type}") }

    /// Config set for either scope: pass an entity id's armor or a type name.
    pub fn notification_config(target: &str, field: &str) -> String { format!("instance:notification-config:{target}:{field}") }

    pub fn notification_stream(token: &str) -> String { format!("instance:notification:{token}") }

    pub fn leader_lease(application: &str) -> String { format!("leader:{application}:current") }

    pub fn leader_candidate(application: &str, instance_id: &str) -> String { format!("leader:{application}:candidates:{instance_id}") }

    pub fn log_stream(application: &str) -> String { format!("log:{application}") }

    pub fn lock(name: &str) -> String { format!("lock:{name}") }
}
