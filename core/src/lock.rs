//! Token-fenced distributed lock over a TTL key. The token written at
//! acquisition fences the unlock: only the holder's token deletes the key,
//! so a lock that expired and was re-acquired elsewhere is never stolen
//! back by a stale unlock.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use tracing::{error, warn};

use crate::backend::KvBackend;
use crate::keys::KeySpace;

pub struct DistributedLock {
    backend: Arc<dyn KvBackend>,
    key: String,
    ttl: Duration,
    token: Option<String>,
}

impl DistributedLock {
    pub fn new(backend: Arc<dyn KvBackend>, name: &str, ttl: Duration) -> Self {
        Self { backend, key: KeySpace::lock(name), ttl, token: None }
    }

    /// One acquisition attempt. Returns whether the lock is now held.
    pub async fn try_lock(&mut self) -> bool {
        let token = fresh_token();
        match self.backend.set_nx_with_ttl(&self.key, &token, self.ttl).await {
            Ok(true) => {
                self.token = Some(token);
                true
            }
            Ok(false) => false,
            Err(err) => {
                error!(key = %self.key, %err, "lock attempt failed");
                false
            }
        }
    }

    /// Acquire, retrying with a jittered sleep until it succeeds.
    pub async fn lock(&mut self) {
        while !self.try_lock().await {
            let jitter = u64::from(uuid::Uuid::new_v4().as_bytes()[0] % 95);
            tokio::time::sleep(Duration::from_millis(5 + jitter)).await;
        }
    }

    /// Extend the TTL of a held lock. Call at most every half TTL.
    pub async fn refresh(&self) -> bool {
        if self.token.is_none() {
            return false;
        }
        match self.backend.expire(&self.key, self.ttl).await {
            Ok(extended) => extended,
            Err(err) => {
                error!(key = %self.key, %err, "lock refresh failed");
                false
            }
        }
    }

    /// Release the lock if it is still ours. A lock lost to expiry is left
    /// to its new holder.
    pub async fn unlock(&mut self) {
        let Some(token) = self.token.take() else { return };

        match self.backend.get(&self.key).await {
            Ok(Some(holder)) if holder == token => {
                if let Err(err) = self.backend.del(&self.key).await {
                    error!(key = %self.key, %err, "lock release failed");
                }
            }
            Ok(_) => warn!(key = %self.key, "lock expired before release"),
            Err(err) => error!(key = %self.key, %err, "lock holder check failed"),
        }
    }

    pub fn is_held(&self) -> bool { self.token.is_some() }
}

fn fresh_token() -> String { general_purpose::STANDARD.encode(&uuid::Uuid::new_v4().as_bytes()[..8]) }
