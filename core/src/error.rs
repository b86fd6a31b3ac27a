use strata_proto::{DecodeError, EntityId};
use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("backend: {0}")]
    Backend(#[from] BackendError),
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("no schema declared for entity type {0:?}")]
    MissingEntitySchema(String),
    #[error("no schema declared for field {0:?}")]
    MissingFieldSchema(String),
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),
    #[error("field cell {field:?} missing for entity {entity_id}")]
    CellNotFound { field: String, entity_id: EntityId },
    #[error("unresolvable field path {0:?}")]
    UnresolvedPath(String),
}
