//! Redis-backed `KvBackend`. One multiplexed connection behind a
//! reconnecting manager; every trait method maps to one Redis command, so
//! the backend's per-command atomicity carries through unchanged.
//!
//! The backend does not own retry policy. A dropped connection surfaces as
//! `BackendError::Connection` and the store worker decides when to probe
//! again; the manager re-establishes the connection underneath.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, RedisError};
use tracing::info;

use strata_core::backend::{BackendError, KvBackend, ScoredMember, StreamEntry};
use strata_core::config::Config;

pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(address: &str, password: &str) -> Result<Self, BackendError> {
        info!(address, "connecting to redis backend");
        let url = if password.is_empty() { format!("redis://{address}/") } else { format!("redis://:{password}@{address}/") };
        let client = Client::open(url).map_err(BackendError::connection)?;
        let manager = ConnectionManager::new(client).await.map_err(BackendError::connection)?;
        Ok(Self { manager })
    }

    pub async fn from_config(config: &Config) -> Result<Self, BackendError> {
        Self::connect(&config.backend_address, &config.backend_password).await
    }

    fn conn(&self) -> ConnectionManager { self.manager.clone() }
}

fn map_err(err: RedisError) -> BackendError {
    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() || err.is_timeout() {
        BackendError::connection(err)
    } else {
        BackendError::command(err)
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        let mut conn = self.conn();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await.map_err(map_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.conn();
        conn.get(key).await.map_err(map_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut conn = self.conn();
        conn.set(key, value).await.map_err(map_err)
    }

    async fn set_nx_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, BackendError> {
        let mut conn = self.conn();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(reply.is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError> {
        let mut conn = self.conn();
        conn.pexpire(key, ttl.as_millis() as i64).await.map_err(map_err)
    }

    async fn del(&self, key: &str) -> Result<(), BackendError> {
        let mut conn = self.conn();
        conn.del(key).await.map_err(map_err)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let mut conn = self.conn();
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<String> = conn.scan_match(pattern).await.map_err(map_err)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<bool, BackendError> {
        let mut conn = self.conn();
        let copied: i64 = redis::cmd("COPY").arg(src).arg(dst).arg("REPLACE").query_async(&mut conn).await.map_err(map_err)?;
        Ok(copied == 1)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), BackendError> {
        let mut conn = self.conn();
        conn.sadd::<_, _, i64>(key, member).await.map_err(map_err)?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), BackendError> {
        let mut conn = self.conn();
        conn.srem::<_, _, i64>(key, member).await.map_err(map_err)?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, BackendError> {
        let mut conn = self.conn();
        conn.smembers(key).await.map_err(map_err)
    }

    async fn stream_add(&self, key: &str, fields: &[(String, String)], maxlen: usize) -> Result<String, BackendError> {
        let mut conn = self.conn();
        conn.xadd_maxlen(key, StreamMaxlen::Approx(maxlen), "*", fields).await.map_err(map_err)
    }

    async fn stream_read(&self, key: &str, after_id: &str, count: usize) -> Result<Vec<StreamEntry>, BackendError> {
        let mut conn = self.conn();
        let options = StreamReadOptions::default().count(count);
        let reply: Option<StreamReadReply> = conn.xread_options(&[key], &[after_id], &options).await.map_err(map_err)?;

        let mut entries = Vec::new();
        for stream_key in reply.unwrap_or_default().keys {
            for id in stream_key.ids {
                let mut fields = Vec::new();
                for (name, value) in &id.map {
                    if let redis::Value::Data(bytes) = value {
                        fields.push((name.clone(), String::from_utf8_lossy(bytes).into_owned()));
                    }
                }
                entries.push(StreamEntry { id: id.id.clone(), fields });
            }
        }
        Ok(entries)
    }

    async fn stream_last_id(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.conn();
        let reply: StreamRangeReply = conn.xrevrange_count(key, "+", "-", 1).await.map_err(map_err)?;
        Ok(reply.ids.first().map(|id| id.id.clone()))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<i64, BackendError> {
        let mut conn = self.conn();
        conn.zadd(key, member, score).await.map_err(map_err)
    }

    async fn zrange_by_score_with_scores(&self, key: &str, min: f64, max: f64) -> Result<Vec<ScoredMember>, BackendError> {
        let mut conn = self.conn();
        let members: Vec<(String, f64)> = conn.zrangebyscore_withscores(key, min, max).await.map_err(map_err)?;
        Ok(members.into_iter().map(|(member, score)| ScoredMember { member, score }).collect())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<i64, BackendError> {
        let mut conn = self.conn();
        conn.zrem(key, member).await.map_err(map_err)
    }

    async fn zrem_range_by_rank(&self, key: &str, start: i64, stop: i64) -> Result<i64, BackendError> {
        let mut conn = self.conn();
        conn.zremrangebyrank(key, start as isize, stop as isize).await.map_err(map_err)
    }
}
