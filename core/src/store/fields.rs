use chrono::Utc;
use tracing::{error, warn};

use strata_proto::{codec, FieldCell, ValueType};

use crate::keys::KeySpace;
use crate::store::{cells, EntityStore, FieldRequest};

impl EntityStore {
    /// Populate each request with its cell's payload and bookkeeping.
    /// Indirected paths are resolved first; a failed entry stays
    /// unsuccessful and the batch continues.
    pub async fn read(&self, requests: &mut [FieldRequest]) {
        for request in requests {
            request.success = false;

            let Some((field, entity_id)) = self.resolve_indirection(&request.field, &request.entity_id).await else {
                warn!(entity_id = %request.entity_id, field = %request.field, "read: unresolvable field path");
                continue;
            };

            match cells::read_cell(self.backend().as_ref(), &field, &entity_id).await {
                Ok(cell) => {
                    request.load(cell);
                    request.success = true;
                }
                Err(err) => {
                    warn!(%entity_id, %field, %err, "read: field cell read failed");
                }
            }
        }
    }

    /// Commit each request's value to its cell. An absent value writes the
    /// declared zero; a payload of the wrong type is coerced to the declared
    /// zero. The notifier fans out after the commit, with the previous cell
    /// captured before it.
    pub async fn write(&self, requests: &mut [FieldRequest]) {
        for request in requests {
            self.write_one(request).await;
        }
    }

    async fn write_one(&self, request: &mut FieldRequest) {
        request.success = false;

        let Some((field, entity_id)) = self.resolve_indirection(&request.field, &request.entity_id).await else {
            warn!(entity_id = %request.entity_id, field = %request.field, "write: unresolvable field path");
            return;
        };

        let Some(schema) = self.get_field_schema(&field).await else {
            warn!(%field, "write: no schema for field");
            return;
        };
        let declared = schema.value_type;

        let value = match request.value.take() {
            None => declared.zero(),
            Some(value) if ValueType::of(&value) != declared => {
                warn!(%field, got = value.value_type().url(), declared = declared.url(), "write: type mismatch, coercing to declared zero");
                declared.zero()
            }
            Some(value) => value,
        };

        let cell = FieldCell {
            entity_id,
            field: field.clone(),
            value,
            write_time: request.write_time.unwrap_or_else(Utc::now),
            writer_id: request.writer_id.clone().unwrap_or_default(),
        };

        let previous = cells::read_cell(self.backend().as_ref(), &field, &entity_id).await.ok();

        let armored = match codec::encode(&cell) {
            Ok(armored) => armored,
            Err(err) => {
                error!(%entity_id, %field, %err, "write: cell encode failed");
                return;
            }
        };
        if let Err(err) = self.backend().set(&KeySpace::field(&field, &entity_id), &armored).await {
            error!(%entity_id, %field, %err, "write: cell write failed");
            return;
        }

        request.value = Some(cell.value.clone());
        request.write_time = Some(cell.write_time);
        request.writer_id = Some(cell.writer_id.clone());
        request.success = true;

        self.notifier().trigger(&cell, previous.as_ref()).await;
    }
}
