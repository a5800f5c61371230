//! Tests for the in-memory storage implementation.

use super::*;

#[tokio::test]
async fn test_get_missing_key_returns_none() {
    let storage = InMemoryStorage::new();
    assert_eq!(storage.get_item("missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_set_then_get() {
    let storage = InMemoryStorage::new();
    storage.set_item("queue", "{\"items\":[]}").await.unwrap();

    assert_eq!(
        storage.get_item("queue").await.unwrap(),
        Some("{\"items\":[]}".to_string())
    );
    assert_eq!(storage.len(), 1);
}

#[tokio::test]
async fn test_set_overwrites() {
    let storage = InMemoryStorage::new();
    storage.set_item("k", "first").await.unwrap();
    storage.set_item("k", "second").await.unwrap();

    assert_eq!(storage.get_item("k").await.unwrap(), Some("second".to_string()));
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let storage = InMemoryStorage::new();
    storage.set_item("k", "v").await.unwrap();

    storage.remove_item("k").await.unwrap();
    storage.remove_item("k").await.unwrap();

    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_clear_removes_everything() {
    let storage = InMemoryStorage::new();
    storage.set_item("a", "1").await.unwrap();
    storage.set_item("b", "2").await.unwrap();

    storage.clear().await.unwrap();

    assert!(storage.is_empty());
    assert_eq!(storage.get_item("a").await.unwrap(), None);
}
