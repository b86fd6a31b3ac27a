use std::time::Duration;

use tracing::warn;

use strata_proto::{Entity, EntitySchema, FieldSchema, StoreSnapshot};

use crate::error::StoreError;
use crate::keys::KeySpace;
use crate::lock::DistributedLock;
use crate::store::{cells, EntityStore};

const RESTORE_LOCK: &str = "restore";
const RESTORE_LOCK_TTL: Duration = Duration::from_secs(10);

impl EntityStore {
    /// Walk both schema spaces, every entity record and every field cell
    /// into one in-memory aggregate.
    ///
    /// The walk is not atomic: a writer racing the walk can leave the
    /// snapshot with a mix of old and new cells. Callers needing a clean
    /// image must quiesce writers first.
    pub async fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let backend = self.backend().as_ref();
        let mut snapshot = StoreSnapshot::default();

        for key in backend.scan(&KeySpace::entity_schema("*")).await? {
            match cells::read_record::<EntitySchema>(backend, &key).await {
                Ok(Some(schema)) => snapshot.entity_schemas.push(schema),
                Ok(None) => {}
                Err(err) => warn!(%key, %err, "snapshot: skipping undecodable entity schema"),
            }
        }
        for key in backend.scan(&KeySpace::field_schema("*")).await? {
            match cells::read_record::<FieldSchema>(backend, &key).await {
                Ok(Some(schema)) => snapshot.field_schemas.push(schema),
                Ok(None) => {}
                Err(err) => warn!(%key, %err, "snapshot: skipping undecodable field schema"),
            }
        }

        for key in backend.scan("instance:entity:*").await? {
            match cells::read_record::<Entity>(backend, &key).await {
                Ok(Some(entity)) => snapshot.entities.push(entity),
                Ok(None) => {}
                Err(err) => warn!(%key, %err, "snapshot: skipping undecodable entity"),
            }
        }

        for entity in snapshot.entities.clone() {
            let Some(schema) = snapshot.entity_schemas.iter().find(|schema| schema.name == entity.entity_type) else {
                warn!(id = %entity.id, entity_type = %entity.entity_type, "snapshot: entity with undeclared type, cells skipped");
                continue;
            };
            for field in &schema.fields {
                match cells::read_cell(backend, field, &entity.id).await {
                    Ok(cell) => snapshot.fields.push(cell),
                    Err(err) => warn!(id = %entity.id, %field, %err, "snapshot: field cell missing"),
                }
            }
        }

        Ok(snapshot)
    }

    /// Wipe the store-owned keyspace and reinsert every record from the
    /// snapshot. No in-place merging. Concurrent restores are serialized by
    /// a backend lock; subscription registrations and streams are left
    /// untouched (they belong to the notifier).
    pub async fn restore(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        let mut lock = DistributedLock::new(self.backend().clone(), RESTORE_LOCK, RESTORE_LOCK_TTL);
        lock.lock().await;

        let result = self.restore_locked(snapshot).await;
        lock.unlock().await;
        result
    }

    async fn restore_locked(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        let backend = self.backend().as_ref();

        for pattern in
            [KeySpace::entity_schema("*"), KeySpace::field_schema("*"), "instance:entity:*".into(), "instance:field:*".into(), KeySpace::entity_type("*")]
        {
            for key in backend.scan(&pattern).await? {
                backend.del(&key).await?;
            }
        }

        for schema in &snapshot.entity_schemas {
            cells::write_record(backend, &KeySpace::entity_schema(&schema.name), schema).await?;
        }
        for schema in &snapshot.field_schemas {
            cells::write_record(backend, &KeySpace::field_schema(&schema.name), schema).await?;
        }
        for entity in &snapshot.entities {
            cells::write_record(backend, &KeySpace::entity(&entity.id), entity).await?;
            backend.sadd(&KeySpace::entity_type(&entity.entity_type), &entity.id.to_base64()).await?;
        }
        for cell in &snapshot.fields {
            cells::write_record(backend, &KeySpace::field(&cell.field, &cell.entity_id), cell).await?;
        }

        Ok(())
    }
}
