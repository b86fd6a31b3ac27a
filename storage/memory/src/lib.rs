//! In-process backend for tests and single-process embedding. Implements
//! the full `KvBackend` contract, including TTL expiry (lazy, on access),
//! capped streams with monotonic ids, and sorted sets. `set_offline` makes
//! every command fail with a connection error, for exercising the
//! disconnected paths.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use strata_core::backend::{BackendError, KvBackend, ScoredMember, StreamEntry};

struct Expiring {
    value: String,
    deadline: Option<Instant>,
}

impl Expiring {
    fn live(&self) -> bool { self.deadline.map_or(true, |deadline| Instant::now() < deadline) }
}

#[derive(Default)]
struct StreamState {
    entries: VecDeque<StreamEntry>,
    last_seq: u64,
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, Expiring>,
    sets: HashMap<String, HashSet<String>>,
    zsets: HashMap<String, Vec<(String, f64)>>,
    streams: HashMap<String, StreamState>,
}

impl Inner {
    fn purge(&mut self, key: &str) {
        if let Some(entry) = self.strings.get(key) {
            if !entry.live() {
                self.strings.remove(key);
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self { Self::default() }

    /// While offline, every command fails with a connection error.
    pub fn set_offline(&self, offline: bool) { self.offline.store(offline, Ordering::SeqCst); }

    fn guard(&self) -> Result<MutexGuard<'_, Inner>, BackendError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::connection(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "backend offline")));
        }
        Ok(self.inner.lock().unwrap())
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        self.guard()?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut inner = self.guard()?;
        inner.purge(key);
        Ok(inner.strings.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut inner = self.guard()?;
        inner.strings.insert(key.to_string(), Expiring { value: value.to_string(), deadline: None });
        Ok(())
    }

    async fn set_nx_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, BackendError> {
        let mut inner = self.guard()?;
        inner.purge(key);
        if inner.strings.contains_key(key) {
            return Ok(false);
        }
        inner.strings.insert(key.to_string(), Expiring { value: value.to_string(), deadline: Some(Instant::now() + ttl) });
        Ok(true)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError> {
        let mut inner = self.guard()?;
        inner.purge(key);
        match inner.strings.get_mut(key) {
            Some(entry) => {
                entry.deadline = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> Result<(), BackendError> {
        let mut inner = self.guard()?;
        inner.strings.remove(key);
        inner.sets.remove(key);
        inner.zsets.remove(key);
        inner.streams.remove(key);
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let mut inner = self.guard()?;
        let dead: Vec<String> = inner.strings.iter().filter(|(_, entry)| !entry.live()).map(|(key, _)| key.clone()).collect();
        for key in dead {
            inner.strings.remove(&key);
        }

        let mut keys: Vec<String> = inner
            .strings
            .keys()
            .chain(inner.sets.keys())
            .chain(inner.zsets.keys())
            .chain(inner.streams.keys())
            .filter(|key| glob_match(pattern.as_bytes(), key.as_bytes()))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<bool, BackendError> {
        let mut inner = self.guard()?;
        inner.purge(src);
        let copied = match inner.strings.get(src) {
            Some(entry) => Expiring { value: entry.value.clone(), deadline: entry.deadline },
            None => return Ok(false),
        };
        inner.strings.insert(dst.to_string(), copied);
        Ok(true)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), BackendError> {
        let mut inner = self.guard()?;
        inner.sets.entry(key.to_string()).or_default().insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), BackendError> {
        let mut inner = self.guard()?;
        let emptied = match inner.sets.get_mut(key) {
            Some(set) => {
                set.remove(member);
                set.is_empty()
            }
            None => false,
        };
        if emptied {
            inner.sets.remove(key);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, BackendError> {
        let inner = self.guard()?;
        Ok(inner.sets.get(key).map(|set| set.iter().cloned().collect()).unwrap_or_default())
    }

    async fn stream_add(&self, key: &str, fields: &[(String, String)], maxlen: usize) -> Result<String, BackendError> {
        let mut inner = self.guard()?;
        let stream = inner.streams.entry(key.to_string()).or_default();
        stream.last_seq += 1;
        let id = format!("{}-0", stream.last_seq);
        stream.entries.push_back(StreamEntry { id: id.clone(), fields: fields.to_vec() });
        while stream.entries.len() > maxlen {
            stream.entries.pop_front();
        }
        Ok(id)
    }

    async fn stream_read(&self, key: &str, after_id: &str, count: usize) -> Result<Vec<StreamEntry>, BackendError> {
        let inner = self.guard()?;
        let Some(stream) = inner.streams.get(key) else { return Ok(Vec::new()) };
        let after = parse_stream_id(after_id);
        Ok(stream.entries.iter().filter(|entry| parse_stream_id(&entry.id) > after).take(count).cloned().collect())
    }

    async fn stream_last_id(&self, key: &str) -> Result<Option<String>, BackendError> {
        let inner = self.guard()?;
        Ok(inner.streams.get(key).and_then(|stream| stream.entries.back()).map(|entry| entry.id.clone()))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<i64, BackendError> {
        let mut inner = self.guard()?;
        let zset = inner.zsets.entry(key.to_string()).or_default();
        match zset.iter_mut().find(|(existing, _)| existing == member) {
            Some((_, existing_score)) => {
                *existing_score = score;
                Ok(0)
            }
            None => {
                zset.push((member.to_string(), score));
                Ok(1)
            }
        }
    }

    async fn zrange_by_score_with_scores(&self, key: &str, min: f64, max: f64) -> Result<Vec<ScoredMember>, BackendError> {
        let inner = self.guard()?;
        let Some(zset) = inner.zsets.get(key) else { return Ok(Vec::new()) };
        let mut members: Vec<ScoredMember> = zset
            .iter()
            .filter(|(_, score)| *score >= min && *score <= max)
            .map(|(member, score)| ScoredMember { member: member.clone(), score: *score })
            .collect();
        members.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.member.cmp(&b.member)));
        Ok(members)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<i64, BackendError> {
        let mut inner = self.guard()?;
        let Some(zset) = inner.zsets.get_mut(key) else { return Ok(0) };
        let before = zset.len();
        zset.retain(|(existing, _)| existing != member);
        Ok((before - zset.len()) as i64)
    }

    async fn zrem_range_by_rank(&self, key: &str, start: i64, stop: i64) -> Result<i64, BackendError> {
        let mut inner = self.guard()?;
        let Some(zset) = inner.zsets.get_mut(key) else { return Ok(0) };
        zset.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let len = zset.len() as i64;
        let normalize = |rank: i64| if rank < 0 { (len + rank).max(0) } else { rank.min(len) };
        let start = normalize(start);
        let stop = (normalize(stop) + 1).min(len);
        if start >= stop {
            return Ok(0);
        }
        zset.drain(start as usize..stop as usize);
        Ok(stop - start)
    }
}

/// Glob matching for `scan`: `*` matches any run, `?` any single byte.
fn glob_match(pattern: &[u8], key: &[u8]) -> bool {
    match (pattern.first(), key.first()) {
        (None, None) => true,
        (Some(b'*'), _) => glob_match(&pattern[1..], key) || (!key.is_empty() && glob_match(pattern, &key[1..])),
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &key[1..]),
        (Some(p), Some(k)) if p == k => glob_match(&pattern[1..], &key[1..]),
        _ => false,
    }
}

fn parse_stream_id(id: &str) -> (u64, u64) {
    match id.split_once('-') {
        Some((ms, seq)) => (ms.parse().unwrap_or(0), seq.parse().unwrap_or(0)),
        None => (id.parse().unwrap_or(0), 0),
    }
}
