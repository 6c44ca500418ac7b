//! Byte-oriented key/value stores used by [`crate::introspector::Cached`].
//!
//! Three stores are provided: an in-memory DashMap with per-entry TTL, a
//! Redis store, and a two-tier cache that keeps a local copy in front of
//! Redis. Values are opaque bytes; the decorator owns their format.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::errors::CacheError;

/// Default entry lifetime: 5 minutes.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Storage the caching decorator writes introspection results to.
///
/// `get` returns `Ok(None)` on a miss. `Err` means the backend itself could
/// not be reached.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;
}

/// Entry stored in the local DashMap with an expiry timestamp.
#[derive(Clone)]
pub(crate) struct CacheEntry {
    value: Vec<u8>,
    pub(crate) expires_at: Instant,
}

// ── In-memory ────────────────────────────────────────────────

/// In-process store. Entries are checked on read and evicted lazily; call
/// [`MemoryStore::evict_expired`] periodically to bound memory.
#[derive(Clone)]
pub struct MemoryStore {
    pub(crate) local: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            local: Arc::new(DashMap::new()),
            ttl,
        }
    }

    fn get_local(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(entry) = self.local.get(key) {
            if Instant::now() < entry.expires_at {
                return Some(entry.value.clone());
            }
            // expired, drop the ref before removing
            drop(entry);
            self.local.remove(key);
        }
        None
    }

    fn insert_local(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.local.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.local.remove(key);
    }

    /// Remove all expired entries. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.local.len();
        self.local.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.local.len())
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS))
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.get_local(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.insert_local(key, value, self.ttl);
        Ok(())
    }
}

// ── Redis ────────────────────────────────────────────────────

/// Shared store backed by Redis `SET EX`.
#[derive(Clone)]
pub struct RedisStore {
    redis: ConnectionManager,
    ttl_secs: u64,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    pub async fn connect(url: &str, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, ttl_secs))
    }

    /// Remaining lifetime of `key`, if Redis knows it.
    async fn ttl_of(&self, key: &str) -> Option<Duration> {
        let mut conn = self.redis.clone();
        let secs = conn.ttl::<_, i64>(key).await.ok()?;
        (secs > 0).then(|| Duration::from_secs(secs as u64))
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.redis.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(key, value, self.ttl_secs).await?;
        Ok(())
    }
}

// ── Two-tier ─────────────────────────────────────────────────

/// Two-tier store: in-memory DashMap (tier 1) backed by Redis (tier 2).
///
/// Reads fall through to Redis on a local miss and copy the value into the
/// local tier with Redis' remaining TTL. Writes go to both tiers.
#[derive(Clone)]
pub struct TieredCache {
    local: MemoryStore,
    redis: RedisStore,
}

impl TieredCache {
    pub fn new(redis: RedisStore) -> Self {
        let ttl = Duration::from_secs(redis.ttl_secs);
        Self {
            local: MemoryStore::new(ttl),
            redis,
        }
    }
}

#[async_trait]
impl CacheStore for TieredCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        // tier 1: in-memory (with TTL check)
        if let Some(v) = self.local.get_local(key) {
            return Ok(Some(v));
        }

        // tier 2: redis
        let Some(v) = self.redis.get(key).await? else {
            return Ok(None);
        };
        // Default to 60s if we can't query it.
        let ttl = self
            .redis
            .ttl_of(key)
            .await
            .unwrap_or(Duration::from_secs(60));
        self.local.insert_local(key, v.clone(), ttl);
        Ok(Some(v))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.local.set(key, value.clone()).await?;
        self.redis.set(key, value).await
    }
}

// ── Tests ────────────────────────────────────────────────────
