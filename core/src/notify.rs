//! Subscription registration, change detection and fan-out.
//!
//! Registered configs live in backend sets so a restarting service can
//! resume; delivered notifications travel through one capped backend stream
//! per subscription token. Callbacks run synchronously on the polling task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{error, warn};

use strata_proto::{codec, EntitySchema, FieldCell, Notification, SubscriptionConfig};

use crate::backend::KvBackend;
use crate::keys::KeySpace;
use crate::store::cells;

/// Cap on each per-subscription stream; trimming is approximate.
const NOTIFICATION_RING: usize = 100;
/// Max entries drained per stream per poll.
const READ_BATCH: usize = 100;

pub type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

struct LocalSubscription {
    callback: NotificationCallback,
    /// Resumption cursor: the id of the last entry handed to the callback.
    cursor: String,
}

pub struct Notifier {
    backend: Arc<dyn KvBackend>,
    local: Mutex<HashMap<String, LocalSubscription>>,
}

impl Notifier {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self { Self { backend, local: Mutex::new(HashMap::new()) } }

    /// Register a subscription and an in-process callback for it. The config
    /// is attached entity-scoped when its target field exists on the named
    /// entity, else type-scoped when the field is declared on the named
    /// type; otherwise the registration is rejected.
    ///
    /// Returns the subscription token: the config's canonical encoding.
    /// Identical configs collapse to the same token and stream.
    pub async fn notify<F>(&self, config: &SubscriptionConfig, callback: F) -> Option<String>
    where F: Fn(&Notification) + Send + Sync + 'static {
        let token = match codec::encode(config) {
            Ok(token) => token,
            Err(err) => {
                error!(%err, "notify: config encode failed");
                return None;
            }
        };

        let mut target = None;
        if let Some(entity_id) = &config.entity_id {
            if !entity_id.is_nil() && cells::read_cell(self.backend.as_ref(), &config.field, entity_id).await.is_ok() {
                target = Some(entity_id.to_base64());
            }
        }
        if target.is_none() && !config.entity_type.is_empty() {
            let schema: Option<EntitySchema> =
                cells::read_record(self.backend.as_ref(), &KeySpace::entity_schema(&config.entity_type)).await.ok().flatten();
            if schema.is_some_and(|schema| schema.has_field(&config.field)) {
                target = Some(config.entity_type.clone());
            }
        }
        let Some(target) = target else {
            warn!(field = %config.field, entity_type = %config.entity_type, "notify: target field not found, rejecting");
            return None;
        };

        if let Err(err) = self.backend.sadd(&KeySpace::notification_config(&target, &config.field), &token).await {
            error!(%err, "notify: config registration failed");
            return None;
        }

        // Start from the newest entry appended after this point.
        let cursor = match self.backend.stream_last_id(&KeySpace::notification_stream(&token)).await {
            Ok(last_id) => last_id.unwrap_or_else(|| "0".to_string()),
            Err(err) => {
                error!(%err, "notify: stream cursor resolution failed");
                return None;
            }
        };

        self.local.lock().unwrap().insert(token.clone(), LocalSubscription { callback: Arc::new(callback), cursor });
        Some(token)
    }

    /// Remove the in-process callback and cursor. The backend-side config
    /// set entry stays behind so a restarting service can resume; removing
    /// it is an administrative concern.
    pub fn unnotify(&self, token: &str) {
        if self.local.lock().unwrap().remove(token).is_none() {
            warn!(token, "unnotify: unknown subscription token");
        }
    }

    /// Fan one committed write out to every matching subscription stream.
    /// `previous` is the cell as it stood before the commit; `None` on the
    /// first write to a never-written cell, which always counts as changed.
    pub(crate) async fn trigger(&self, current: &FieldCell, previous: Option<&FieldCell>) {
        let changed = match previous {
            Some(previous) => match (codec::to_bytes(&previous.value), codec::to_bytes(&current.value)) {
                (Ok(old), Ok(new)) => old != new,
                _ => true,
            },
            None => true,
        };

        let mut config_sets = vec![KeySpace::notification_config(&current.entity_id.to_base64(), &current.field)];
        match cells::read_entity(self.backend.as_ref(), &current.entity_id).await {
            Ok(entity) => config_sets.push(KeySpace::notification_config(&entity.entity_type, &current.field)),
            Err(err) => warn!(entity_id = %current.entity_id, %err, "trigger: entity record unavailable, type-scoped fan-out skipped"),
        }

        for set_key in config_sets {
            let tokens = match self.backend.smembers(&set_key).await {
                Ok(tokens) => tokens,
                Err(err) => {
                    error!(%set_key, %err, "trigger: config set read failed");
                    continue;
                }
            };

            for token in tokens {
                let config: SubscriptionConfig = match codec::decode(&token) {
                    Ok(config) => config,
                    Err(err) => {
                        error!(%err, "trigger: undecodable subscription config");
                        continue;
                    }
                };

                if config.notify_on_change && !changed {
                    continue;
                }

                let mut context = Vec::new();
                for context_field in &config.context_fields {
                    match cells::read_cell(self.backend.as_ref(), context_field, &current.entity_id).await {
                        Ok(cell) => context.push(cell),
                        Err(err) => warn!(%context_field, %err, "trigger: context field read failed"),
                    }
                }

                let notification =
                    Notification { token: token.clone(), current: current.clone(), previous: previous.cloned(), context };
                let armored = match codec::encode(&notification) {
                    Ok(armored) => armored,
                    Err(err) => {
                        error!(%err, "trigger: notification encode failed");
                        continue;
                    }
                };
                if let Err(err) = self
                    .backend
                    .stream_add(&KeySpace::notification_stream(&token), &[("data".to_string(), armored)], NOTIFICATION_RING)
                    .await
                {
                    error!(%err, "trigger: notification append failed");
                }
            }
        }
    }

    /// Drain every locally registered stream, invoking callbacks in append
    /// order. Non-blocking: an empty stream is the expected idle case. The
    /// cursor advances only once an entry has been handled, where handling
    /// includes skipping an entry that fails to decode.
    pub async fn process_notifications(&self) {
        let tokens: Vec<String> = self.local.lock().unwrap().keys().cloned().collect();

        for token in tokens {
            let Some(cursor) = self.local.lock().unwrap().get(&token).map(|sub| sub.cursor.clone()) else { continue };

            let entries = match self.backend.stream_read(&KeySpace::notification_stream(&token), &cursor, READ_BATCH).await {
                Ok(entries) => entries,
                Err(err) => {
                    error!(%err, "process_notifications: stream read failed");
                    continue;
                }
            };

            for entry in entries {
                // Unsubscribed mid-drain means the rest of the batch is dropped.
                let callback = match self.local.lock().unwrap().get(&token) {
                    Some(sub) => sub.callback.clone(),
                    None => break,
                };

                match entry.field("data") {
                    Some(data) => match codec::decode::<Notification>(data) {
                        Ok(notification) => callback(&notification),
                        Err(err) => error!(entry_id = %entry.id, %err, "process_notifications: skipping undecodable notification"),
                    },
                    None => warn!(entry_id = %entry.id, "process_notifications: entry without data field"),
                }

                match self.local.lock().unwrap().get_mut(&token) {
                    Some(sub) => sub.cursor = entry.id.clone(),
                    None => break,
                }
            }
        }
    }

    /// Number of in-process subscriptions.
    pub fn subscription_count(&self) -> usize { self.local.lock().unwrap().len() }
}
