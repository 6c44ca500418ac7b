//! Memoizing decorator.
//!
//! Both outcomes are cached: a token the inner introspector rejects is
//! remembered as rejected, so it is not re-evaluated on every request. The
//! stored record is `{"introspection": {...}, "error": "..."}` where an empty
//! `error` means success.
//!
//! Store policy: a backend that cannot be reached is treated as a miss on
//! read and ignored (with a warning) on write, so the wrapped call still
//! answers. A payload that cannot be serialized or parsed is a hard error.
//!
//! Scopes are stored space-joined, so a scope that itself contains a space
//! comes back split on a cache hit (`["a b"]` is replayed as `["a", "b"]`).
//! Backends are expected to hand out space-free scope tokens.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{token_prefix, Introspector, Warden};
use crate::cache::CacheStore;
use crate::errors::IntrospectError;
use crate::models::{Introspection, Permission};

const INTROSPECT_PREFIX: &str = "introspect:";
const ALLOWED_PREFIX: &str = "allowed:";

/// A cached `introspect` outcome.
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedIntrospection {
    pub introspection: Introspection,
    pub error: String,
}

/// A cached `allowed` outcome.
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedAllowed {
    pub introspection: Introspection,
    pub allowed: bool,
    pub error: String,
}

/// Canonical form of an `allowed` request, used as the cache key body.
#[derive(Serialize)]
struct AllowedKey<'a> {
    token: &'a str,
    resource: &'a str,
    action: &'a str,
    context: &'a BTreeMap<String, String>,
    scopes: &'a [String],
}

/// Wraps one introspector and memoizes its answers in a [`CacheStore`].
pub struct Cached<I> {
    inner: I,
    store: Arc<dyn CacheStore>,
}

impl<I> Cached<I> {
    pub fn new(inner: I, store: Arc<dyn CacheStore>) -> Self {
        Self { inner, store }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// Cache key for an `introspect` call.
    pub fn introspect_key(token: &str) -> String {
        format!("{}{}", INTROSPECT_PREFIX, token)
    }

    /// Cache key for an `allowed` call. Distinct permissions or scope lists
    /// for the same token get distinct keys.
    pub fn allowed_key(
        token: &str,
        permission: &Permission,
        scopes: &[String],
    ) -> Result<String, IntrospectError> {
        let body = serde_json::to_string(&AllowedKey {
            token,
            resource: &permission.resource,
            action: &permission.action,
            context: &permission.context,
            scopes,
        })
        .map_err(IntrospectError::Serialization)?;
        Ok(format!("{}{}", ALLOWED_PREFIX, body))
    }

    /// Read a cached record. Backend failures count as a miss.
    async fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        match self.store.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Write a record. Backend failures are logged and otherwise ignored.
    async fn remember<T: Serialize>(&self, key: &str, record: &T) -> Result<(), IntrospectError> {
        let data = serde_json::to_vec(record).map_err(IntrospectError::Serialization)?;
        if let Err(e) = self.store.set(key, data).await {
            tracing::warn!(error = %e, "cache write failed");
        }
        Ok(())
    }
}

fn decode<T: for<'de> Deserialize<'de>>(key: &str, data: &[u8]) -> Result<T, IntrospectError> {
    serde_json::from_slice(data).map_err(|source| IntrospectError::CorruptCacheEntry {
        key: key.to_string(),
        source,
    })
}

#[async_trait]
impl<I: Introspector> Introspector for Cached<I> {
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectError> {
        let key = Self::introspect_key(token);

        if let Some(data) = self.lookup(&key).await {
            let record: CachedIntrospection = decode(&key, &data)?;
            tracing::trace!(token = token_prefix(token), "introspection cache hit");
            return if record.error.is_empty() {
                Ok(record.introspection)
            } else {
                Err(IntrospectError::Cached(record.error))
            };
        }

        let result = self.inner.introspect(token).await;
        let record = match &result {
            Ok(introspection) => CachedIntrospection {
                introspection: introspection.clone(),
                error: String::new(),
            },
            Err(e) => CachedIntrospection {
                introspection: Introspection::inactive(),
                error: e.to_string(),
            },
        };
        self.remember(&key, &record).await?;

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl<I: Warden> Warden for Cached<I> {
    async fn allowed(
        &self,
        token: &str,
        permission: &Permission,
        scopes: &[String],
    ) -> Result<(Introspection, bool), IntrospectError> {
        let key = Self::allowed_key(token, permission, scopes)?;

        if let Some(data) = self.lookup(&key).await {
            let record: CachedAllowed = decode(&key, &data)?;
            tracing::trace!(token = token_prefix(token), "permission cache hit");
            return if record.error.is_empty() {
                Ok((record.introspection, record.allowed))
            } else {
                Err(IntrospectError::Cached(record.error))
            };
        }

        let result = self.inner.allowed(token, permission, scopes).await;
        let record = match &result {
            Ok((introspection, allowed)) => CachedAllowed {
                introspection: introspection.clone(),
                allowed: *allowed,
                error: String::new(),
            },
            Err(e) => CachedAllowed {
                introspection: Introspection::inactive(),
                allowed: false,
                error: e.to_string(),
            },
        };
        self.remember(&key, &record).await?;

        result
    }
}

// ── Tests ────────────────────────────────────────────────────
