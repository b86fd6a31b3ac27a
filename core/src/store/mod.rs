pub(crate) mod cells;
mod fields;
mod indirection;
mod request;
mod snapshot;

pub use request::FieldRequest;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use strata_proto::{codec, Entity, EntityId, EntitySchema, FieldSchema};

use crate::backend::{KvBackend, ScoredMember};
use crate::keys::KeySpace;
use crate::notify::Notifier;

/// The entity-field data engine. Owns the schema spaces, the entity graph
/// and every field cell; fans committed writes into the notifier.
///
/// Operations are fail-soft: batch entries carry a per-request success flag,
/// lookups return `None` on failure, and every failure is logged. Nothing
/// here unwinds on a domain error.
pub struct EntityStore {
    backend: Arc<dyn KvBackend>,
    notifier: Notifier,
}

impl EntityStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        let notifier = Notifier::new(backend.clone());
        Self { backend, notifier }
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> { &self.backend }

    pub fn notifier(&self) -> &Notifier { &self.notifier }

    pub async fn get_entity_schema(&self, entity_type: &str) -> Option<EntitySchema> {
        self.read_record(&KeySpace::entity_schema(entity_type)).await
    }

    pub async fn set_entity_schema(&self, schema: &EntitySchema) {
        self.write_record(&KeySpace::entity_schema(&schema.name), schema).await;
    }

    pub async fn get_field_schema(&self, field: &str) -> Option<FieldSchema> {
        self.read_record(&KeySpace::field_schema(field)).await
    }

    pub async fn set_field_schema(&self, schema: &FieldSchema) {
        self.write_record(&KeySpace::field_schema(&schema.name), schema).await;
    }

    /// Create an entity of a declared type and its field cells, each holding
    /// the declared type's zero value. The entity record lands before the
    /// cells so type-scoped subscriptions can resolve the new entity.
    pub async fn create_entity(&self, entity_type: &str, parent: Option<&EntityId>, name: &str) -> Option<EntityId> {
        let Some(schema) = self.get_entity_schema(entity_type).await else {
            error!(entity_type, "create_entity: no schema for entity type");
            return None;
        };

        let id = EntityId::new();
        let entity =
            Entity { id, entity_type: entity_type.to_string(), name: name.to_string(), parent: parent.copied(), children: Vec::new() };

        if !self.write_record(&KeySpace::entity(&id), &entity).await {
            return None;
        }
        if let Err(err) = self.backend.sadd(&KeySpace::entity_type(entity_type), &id.to_base64()).await {
            error!(%id, %err, "create_entity: type index update failed");
        }

        let mut requests: Vec<FieldRequest> = schema.fields.iter().map(|field| FieldRequest::new(id, field.as_str())).collect();
        self.write(&mut requests).await;

        if let Some(parent_id) = parent {
            match self.get_entity(parent_id).await {
                Some(mut parent_entity) => {
                    parent_entity.children.push(id);
                    self.set_entity(&parent_entity).await;
                }
                // The entity stands; only the link is missing.
                None => warn!(%parent_id, %id, "create_entity: parent not found, link not established"),
            }
        }

        Some(id)
    }

    pub async fn get_entity(&self, id: &EntityId) -> Option<Entity> { self.read_record(&KeySpace::entity(id)).await }

    pub async fn set_entity(&self, entity: &Entity) -> bool { self.write_record(&KeySpace::entity(&entity.id), entity).await }

    /// Delete an entity and every descendant: field cells, type index
    /// membership and entity records. Children orphaned by an earlier failed
    /// delete are skipped, not reparented.
    pub async fn delete_entity(&self, id: &EntityId) {
        let Some(entity) = self.get_entity(id).await else {
            warn!(%id, "delete_entity: entity not found");
            return;
        };

        if let Some(parent_id) = entity.parent {
            if let Some(mut parent) = self.get_entity(&parent_id).await {
                parent.children.retain(|child| child != id);
                self.set_entity(&parent).await;
            }
        }

        // Collect the subtree iteratively; each entity is then torn down in
        // isolation so a missing child cannot abort the cascade.
        let mut stack = vec![entity];
        let mut subtree = Vec::new();
        while let Some(current) = stack.pop() {
            for child_id in &current.children {
                match self.get_entity(child_id).await {
                    Some(child) => stack.push(child),
                    None => warn!(%child_id, parent = %current.id, "delete_entity: dangling child reference"),
                }
            }
            subtree.push(current);
        }

        for entity in subtree {
            if let Some(schema) = self.get_entity_schema(&entity.entity_type).await {
                for field in &schema.fields {
                    if let Err(err) = self.backend.del(&KeySpace::field(field, &entity.id)).await {
                        error!(id = %entity.id, %field, %err, "delete_entity: field cell delete failed");
                    }
                }
            } else {
                warn!(id = %entity.id, entity_type = %entity.entity_type, "delete_entity: no schema, field cells left behind");
            }

            if let Err(err) = self.backend.srem(&KeySpace::entity_type(&entity.entity_type), &entity.id.to_base64()).await {
                error!(id = %entity.id, %err, "delete_entity: type index removal failed");
            }
            if let Err(err) = self.backend.del(&KeySpace::entity(&entity.id)).await {
                error!(id = %entity.id, %err, "delete_entity: entity record delete failed");
            }
        }
    }

    pub async fn find_entities(&self, entity_type: &str) -> Vec<EntityId> {
        let members = match self.backend.smembers(&KeySpace::entity_type(entity_type)).await {
            Ok(members) => members,
            Err(err) => {
                error!(entity_type, %err, "find_entities: type index read failed");
                return Vec::new();
            }
        };
        members
            .into_iter()
            .filter_map(|armored| match EntityId::try_from(armored.as_str()) {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(%armored, %err, "find_entities: bad id in type index");
                    None
                }
            })
            .collect()
    }

    /// Every entity type with at least one instance.
    pub async fn entity_types(&self) -> Vec<String> {
        let prefix = KeySpace::entity_type("");
        match self.backend.scan(&KeySpace::entity_type("*")).await {
            Ok(keys) => keys.into_iter().filter_map(|key| key.strip_prefix(&prefix).map(str::to_string)).collect(),
            Err(err) => {
                error!(%err, "entity_types: scan failed");
                Vec::new()
            }
        }
    }

    pub async fn entity_exists(&self, id: &EntityId) -> bool {
        matches!(self.backend.get(&KeySpace::entity(id)).await, Ok(Some(value)) if !value.is_empty())
    }

    /// Does `field` exist on the given entity type, or failing that, on the
    /// specific entity whose id armor was passed?
    pub async fn field_exists(&self, field: &str, entity_type_or_id: &str) -> bool {
        if let Some(schema) = self.get_entity_schema(entity_type_or_id).await {
            return schema.has_field(field);
        }

        let Ok(id) = EntityId::try_from(entity_type_or_id) else { return false };
        let mut request = FieldRequest::new(id, field);
        self.read(std::slice::from_mut(&mut request)).await;
        request.success
    }

    // Temporary keys: TTL pass-throughs for collaborators. The store attaches
    // no schema meaning to these.

    pub async fn temp_set(&self, key: &str, value: &str, ttl: Duration) -> bool {
        match self.backend.set_nx_with_ttl(key, value, ttl).await {
            Ok(written) => written,
            Err(err) => {
                error!(key, %err, "temp_set failed");
                false
            }
        }
    }

    pub async fn temp_get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(err) => {
                error!(key, %err, "temp_get failed");
                None
            }
        }
    }

    pub async fn temp_expire(&self, key: &str, ttl: Duration) -> bool {
        match self.backend.expire(key, ttl).await {
            Ok(updated) => updated,
            Err(err) => {
                error!(key, %err, "temp_expire failed");
                false
            }
        }
    }

    pub async fn temp_del(&self, key: &str) {
        if let Err(err) = self.backend.del(key).await {
            error!(key, %err, "temp_del failed");
        }
    }

    pub async fn temp_scan(&self, pattern: &str) -> Vec<String> {
        match self.backend.scan(pattern).await {
            Ok(keys) => keys,
            Err(err) => {
                error!(pattern, %err, "temp_scan failed");
                Vec::new()
            }
        }
    }

    // Sorted-set utilities for time-ordered collaborators.

    pub async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> i64 {
        match self.backend.zadd(key, member, score).await {
            Ok(added) => added,
            Err(err) => {
                error!(key, %err, "sorted_set_add failed");
                0
            }
        }
    }

    pub async fn sorted_set_range_by_score_with_scores(&self, key: &str, min: f64, max: f64) -> Vec<ScoredMember> {
        match self.backend.zrange_by_score_with_scores(key, min, max).await {
            Ok(members) => members,
            Err(err) => {
                error!(key, %err, "sorted_set_range_by_score_with_scores failed");
                Vec::new()
            }
        }
    }

    pub async fn sorted_set_remove(&self, key: &str, member: &str) -> i64 {
        match self.backend.zrem(key, member).await {
            Ok(removed) => removed,
            Err(err) => {
                error!(key, %err, "sorted_set_remove failed");
                0
            }
        }
    }

    pub async fn sorted_set_remove_range_by_rank(&self, key: &str, start: i64, stop: i64) -> i64 {
        match self.backend.zrem_range_by_rank(key, start, stop).await {
            Ok(removed) => removed,
            Err(err) => {
                error!(key, %err, "sorted_set_remove_range_by_rank failed");
                0
            }
        }
    }

    async fn read_record<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match cells::read_record(self.backend.as_ref(), key).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                debug!(key, "record not found");
                None
            }
            Err(err) => {
                error!(key, %err, "record read failed");
                None
            }
        }
    }

    async fn write_record<T: serde::Serialize>(&self, key: &str, record: &T) -> bool {
        let armored = match codec::encode(record) {
            Ok(armored) => armored,
            Err(err) => {
                error!(key, %err, "record encode failed");
                return false;
            }
        };
        match self.backend.set(key, &armored).await {
            Ok(()) => true,
            Err(err) => {
                error!(key, %err, "record write failed");
                false
            }
        }
    }
}
