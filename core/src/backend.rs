//! The key-value backend contract. Everything above this trait is backend
//! agnostic; each method maps to one atomic backend command.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend connection failure: {0}")]
    Connection(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("backend command failure: {0}")]
    Command(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl BackendError {
    pub fn connection(err: impl std::error::Error + Send + Sync + 'static) -> Self { BackendError::Connection(Box::new(err)) }

    pub fn command(err: impl std::error::Error + Send + Sync + 'static) -> Self { BackendError::Command(Box::new(err)) }
}

/// One entry read from a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<(String, String)>,
}

impl StreamEntry {
    pub fn field(&self, name: &str) -> Option<&str> { self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str()) }
}

/// One member of a sorted set together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn ping(&self) -> Result<(), BackendError>;

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;
    /// Set only when the key is absent, with a TTL. Returns whether the
    /// write happened.
    async fn set_nx_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, BackendError>;
    /// Reset a key's TTL. Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError>;
    async fn del(&self, key: &str) -> Result<(), BackendError>;
    /// Keys matching a glob pattern. Order is unspecified.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, BackendError>;
    /// Copy one key's value (and remaining TTL) over another, replacing it.
    /// Returns false when the source does not exist.
    async fn copy(&self, src: &str, dst: &str) -> Result<bool, BackendError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<(), BackendError>;
    async fn srem(&self, key: &str, member: &str) -> Result<(), BackendError>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>, BackendError>;

    /// Append an entry, trimming the stream to approximately `maxlen`.
    /// Returns the new entry's id.
    async fn stream_add(&self, key: &str, fields: &[(String, String)], maxlen: usize) -> Result<String, BackendError>;
    /// Read up to `count` entries with ids strictly after `after_id`,
    /// returning immediately when there are none.
    async fn stream_read(&self, key: &str, after_id: &str, count: usize) -> Result<Vec<StreamEntry>, BackendError>;
    /// The id of the newest entry, if the stream has any.
    async fn stream_last_id(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Returns the number of members newly added.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<i64, BackendError>;
    async fn zrange_by_score_with_scores(&self, key: &str, min: f64, max: f64) -> Result<Vec<ScoredMember>, BackendError>;
    /// Returns the number of members removed.
    async fn zrem(&self, key: &str, member: &str) -> Result<i64, BackendError>;
    /// Remove members by rank range (inclusive, 0-based, negatives count
    /// from the tail). Returns the number removed.
    async fn zrem_range_by_rank(&self, key: &str, start: i64, stop: i64) -> Result<i64, BackendError>;
}
