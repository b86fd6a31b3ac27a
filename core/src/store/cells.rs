//! Record-level reads shared by the store and the notifier. The notifier
//! reads entity records and field cells but never writes them.

use serde::de::DeserializeOwned;
use serde::Serialize;

use strata_proto::{codec, Entity, EntityId, FieldCell};

use crate::backend::KvBackend;
use crate::error::StoreError;
use crate::keys::KeySpace;

pub(crate) async fn read_record<T: DeserializeOwned>(backend: &dyn KvBackend, key: &str) -> Result<Option<T>, StoreError> {
    match backend.get(key).await? {
        Some(armored) => Ok(Some(codec::decode(&armored)?)),
        None => Ok(None),
    }
}

pub(crate) async fn write_record<T: Serialize>(backend: &dyn KvBackend, key: &str, record: &T) -> Result<(), StoreError> {
    let armored = codec::encode(record)?;
    backend.set(key, &armored).await?;
    Ok(())
}

pub(crate) async fn read_entity(backend: &dyn KvBackend, id: &EntityId) -> Result<Entity, StoreError> {
    read_record(backend, &KeySpace::entity(id)).await?.ok_or(StoreError::EntityNotFound(*id))
}

pub(crate) async fn read_cell(backend: &dyn KvBackend, field: &str, id: &EntityId) -> Result<FieldCell, StoreError> {
    read_record(backend, &KeySpace::field(field, id))
        .await?
        .ok_or_else(|| StoreError::CellNotFound { field: field.to_string(), entity_id: *id })
}
