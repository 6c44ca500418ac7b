//! Cached decorator over real variants and the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use introspector::backends::{Mock, WardenMock};
use introspector::cache::{CacheStore, MemoryStore};
use introspector::{Cached, IntrospectError, Introspector, Permission, Warden};

#[tokio::test]
async fn test_success_is_stored_under_token_key() {
    let store = Arc::new(MemoryStore::new(Duration::from_secs(60)));
    let cached = Cached::new(Mock::new(), store.clone());

    let i = cached.introspect("alice.read").await.unwrap();
    assert_eq!(i.subject, "alice");

    let raw = store.get("introspect:alice.read").await.unwrap().unwrap();
    let record: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(record["error"], "");
    assert_eq!(record["introspection"]["sub"], "alice");
    assert_eq!(record["introspection"]["scope"], "read");
}

#[tokio::test]
async fn test_failure_replays_identical_message() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::default());
    let cached = Cached::new(Mock::new(), store);

    let fresh = cached.introspect("a.b.c").await.unwrap_err();
    let replayed = cached.introspect("a.b.c").await.unwrap_err();

    assert!(matches!(fresh, IntrospectError::Malformed(_)));
    assert!(matches!(replayed, IntrospectError::Cached(_)));
    assert_eq!(fresh.to_string(), replayed.to_string());
}

#[tokio::test]
async fn test_allowed_cached_per_permission() {
    let token = r#"{"subject":"1","scopes":["s"],"actions":["drive"],"resources":["car:777"]}"#;
    let store = Arc::new(MemoryStore::default());
    let cached = Cached::new(WardenMock::new(), store.clone());

    let (_, yes) = cached.allowed(token, &Permission::new("drive", "car:777"), &[]).await.unwrap();
    let (_, no) = cached.allowed(token, &Permission::new("sell", "car:777"), &[]).await.unwrap();
    assert!(yes);
    assert!(!no);
    assert_eq!(store.len(), 2);

    // served from the cache
    let (_, again) = cached.allowed(token, &Permission::new("drive", "car:777"), &[]).await.unwrap();
    assert!(again);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_expired_entry_is_recomputed() {
    let store = Arc::new(MemoryStore::new(Duration::from_millis(10)));
    let cached = Cached::new(Mock::new(), store.clone());

    cached.introspect("alice.read").await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(store.get("introspect:alice.read").await.unwrap().is_none());

    cached.introspect("alice.read").await.unwrap();
    assert!(store.get("introspect:alice.read").await.unwrap().is_some());
}

#[tokio::test]
async fn test_scope_with_space_is_split_on_replay() {
    let token = r#"{"subject":"x","scopes":["a b"]}"#;
    let cached = Cached::new(WardenMock::new(), Arc::new(MemoryStore::default()));

    let fresh = cached.introspect(token).await.unwrap();
    let replayed = cached.introspect(token).await.unwrap();

    assert_eq!(fresh.scope, vec!["a b"]);
    assert_eq!(replayed.scope, vec!["a", "b"]);
    assert_eq!(fresh.scope_string(), replayed.scope_string());
}
