//! InMemoryBlobStore - 開発・テスト用の blob storage

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::{BlobStore, StoreError};

type Key = (String, String);

/// `(container, path) -> bytes`.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<Mutex<BTreeMap<Key, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, container: &str, path: &str) -> bool {
        let blobs = self.blobs.lock().await;
        blobs.contains_key(&(container.to_string(), path.to_string()))
    }

    /// Paths stored in `container`, sorted.
    pub async fn paths(&self, container: &str) -> Vec<String> {
        let blobs = self.blobs.lock().await;
        blobs
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, container: &str, path: &str) -> Result<Vec<u8>, StoreError> {
        let blobs = self.blobs.lock().await;
        blobs
            .get(&(container.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(container, path))
    }

    async fn put(&self, container: &str, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().await;
        blobs.insert((container.to_string(), path.to_string()), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, container: &str, path: &str) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().await;
        blobs
            .remove(&(container.to_string(), path.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(container, path))
    }

    async fn copy(
        &self,
        src_container: &str,
        path: &str,
        dst_container: &str,
    ) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().await;
        let bytes = blobs
            .get(&(src_container.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(src_container, path))?;
        blobs.insert((dst_container.to_string(), path.to_string()), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = InMemoryBlobStore::new();
        store.put("outbound", "a.xml", b"<a/>").await.unwrap();

        assert_eq!(store.get("outbound", "a.xml").await.unwrap(), b"<a/>");

        store.delete("outbound", "a.xml").await.unwrap();
        assert!(store.get("outbound", "a.xml").await.unwrap_err().is_not_found());
        assert!(store.delete("outbound", "a.xml").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn copy_keeps_source() {
        let store = InMemoryBlobStore::new();
        store.put("outbound", "x/a.xml", b"<a/>").await.unwrap();
        store.copy("outbound", "x/a.xml", "archived").await.unwrap();

        assert!(store.contains("outbound", "x/a.xml").await);
        assert_eq!(store.paths("archived").await, vec!["x/a.xml".to_string()]);
    }

    #[tokio::test]
    async fn copy_of_missing_source_is_not_found() {
        let store = InMemoryBlobStore::new();
        let err = store.copy("outbound", "gone.xml", "archived").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
