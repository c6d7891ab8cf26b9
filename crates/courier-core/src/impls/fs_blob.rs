//! LocalBlobStore - ローカルファイルシステム上の blob storage
//!
//! Layout: `<root>/<container>/<path>`. Paths may contain `/`; `..` and
//! absolute paths are refused so nothing escapes the root.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::ports::{BlobStore, StoreError};

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, container: &str, path: &str) -> Result<PathBuf, StoreError> {
        let container_ok =
            !container.is_empty() && !container.contains(['/', '\\']) && container != "..";
        let relative = Path::new(path);
        let path_ok = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !container_ok || !path_ok {
            return Err(StoreError::InvalidPath(format!("{container}/{path}")));
        }
        Ok(self.root.join(container).join(relative))
    }

    fn map_io(err: std::io::Error, container: &str, path: &str) -> StoreError {
        if err.kind() == IoErrorKind::NotFound {
            StoreError::not_found(container, path)
        } else {
            StoreError::Io(err)
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, container: &str, path: &str) -> Result<Vec<u8>, StoreError> {
        let file = self.blob_path(container, path)?;
        tokio::fs::read(&file)
            .await
            .map_err(|e| Self::map_io(e, container, path))
    }

    async fn put(&self, container: &str, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let file = self.blob_path(container, path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, bytes).await?;
        Ok(())
    }

    async fn delete(&self, container: &str, path: &str) -> Result<(), StoreError> {
        let file = self.blob_path(container, path)?;
        tokio::fs::remove_file(&file)
            .await
            .map_err(|e| Self::map_io(e, container, path))
    }

    async fn copy(
        &self,
        src_container: &str,
        path: &str,
        dst_container: &str,
    ) -> Result<(), StoreError> {
        let src = self.blob_path(src_container, path)?;
        let dst = self.blob_path(dst_container, path)?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&src, &dst)
            .await
            .map(|_| ())
            .map_err(|e| Self::map_io(e, src_container, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_with_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.put("outbound", "2024/01/a.xml", b"<a/>").await.unwrap();
        assert!(dir.path().join("outbound/2024/01/a.xml").is_file());
        assert_eq!(store.get("outbound", "2024/01/a.xml").await.unwrap(), b"<a/>");

        store.copy("outbound", "2024/01/a.xml", "failed").await.unwrap();
        assert!(dir.path().join("failed/2024/01/a.xml").is_file());

        store.delete("outbound", "2024/01/a.xml").await.unwrap();
        assert!(store.get("outbound", "2024/01/a.xml").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn missing_blobs_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        assert!(store.delete("outbound", "a.xml").await.unwrap_err().is_not_found());
        assert!(store.copy("outbound", "a.xml", "archived").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn refuses_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        let refused = [
            ("outbound", "../x.xml"),
            ("..", "x.xml"),
            ("outbound", "/etc/passwd"),
            ("a/b", "x"),
        ];
        for (container, path) in refused {
            let err = store.put(container, path, b"x").await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidPath(_)), "{container}/{path}");
        }
    }
}
