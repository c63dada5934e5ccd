//! In-memory object store

use crate::storage::{normalize_key, ObjectStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory store keyed by `(bucket, key)`
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.lock()
            .insert((bucket.to_string(), normalize_key(key).to_string()), body.into());
    }

    /// Peek at an object without going through the async API
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .get(&(bucket.to_string(), normalize_key(key).to_string()))
            .cloned()
    }

    /// All object keys in a bucket, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Vec<u8>>> {
        // A poisoned map is still a valid map.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.object(bucket, key).ok_or_else(|| StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), StoreError> {
        self.insert(bucket, key, body.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_keys() {
        let store = InMemoryStore::new();
        store.put("b", "x/1", b"one").await.unwrap();
        store.put("b", "/x/2", b"two").await.unwrap();
        store.put("other", "x/3", b"three").await.unwrap();

        assert_eq!(store.get("b", "x/2").await.unwrap(), b"two");
        assert_eq!(store.keys("b"), vec!["x/1".to_string(), "x/2".to_string()]);
    }

    #[tokio::test]
    async fn test_missing() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.get("b", "nope").await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
