//! Backend-visible log tail: one capped stream per application holding the
//! most recent records at or above the configured severity. Console logging
//! is `tracing`'s job; the ring exists so other replicas and dashboards can
//! read the tail without host access.

use std::sync::Arc;

use chrono::Utc;
use tracing::error;

use strata_proto::{codec, LogLevel, LogRecord};

use crate::backend::KvBackend;
use crate::config::Config;
use crate::keys::KeySpace;

pub struct LogRing {
    backend: Arc<dyn KvBackend>,
    application: String,
    threshold: LogLevel,
    ring_length: usize,
}

impl LogRing {
    pub fn new(backend: Arc<dyn KvBackend>, config: &Config) -> Self {
        Self { backend, application: config.application.clone(), threshold: config.log_level, ring_length: config.log_ring_length }
    }

    /// Persist one record, unless it falls below the severity threshold.
    pub async fn append(&self, level: LogLevel, message: impl Into<String>) {
        if level < self.threshold {
            return;
        }
        let record = LogRecord { level, application: self.application.clone(), message: message.into(), timestamp: Utc::now() };
        let armored = match codec::encode(&record) {
            Ok(armored) => armored,
            Err(err) => {
                error!(%err, "log ring: record encode failed");
                return;
            }
        };
        if let Err(err) =
            self.backend.stream_add(&KeySpace::log_stream(&self.application), &[("data".to_string(), armored)], self.ring_length).await
        {
            error!(%err, "log ring: append failed");
        }
    }

    /// The retained records, oldest first.
    pub async fn tail(&self, count: usize) -> Vec<LogRecord> {
        let entries = match self.backend.stream_read(&KeySpace::log_stream(&self.application), "0", count).await {
            Ok(entries) => entries,
            Err(err) => {
                error!(%err, "log ring: read failed");
                return Vec::new();
            }
        };
        entries
            .iter()
            .filter_map(|entry| entry.field("data"))
            .filter_map(|data| match codec::decode::<LogRecord>(data) {
                Ok(record) => Some(record),
                Err(err) => {
                    error!(%err, "log ring: skipping undecodable record");
                    None
                }
            })
            .collect()
    }
}
