//! BlobStore port - object storage holding documents and receipts.
//!
//! Containers are flat namespaces; paths may contain `/`.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("blob {container}/{path} does not exist")]
    NotFound { container: String, path: String },

    #[error("invalid blob path {0:?}")]
    InvalidPath(String),

    #[error("storage operation failed: {0}")]
    OperationFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(container: &str, path: &str) -> Self {
        StoreError::NotFound {
            container: container.to_string(),
            path: path.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Storage backend contract.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, container: &str, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or overwrite.
    async fn put(&self, container: &str, path: &str, bytes: &[u8]) -> Result<(), StoreError>;

    async fn delete(&self, container: &str, path: &str) -> Result<(), StoreError>;

    /// Copy `src_container/path` to `dst_container/path`.
    async fn copy(&self, src_container: &str, path: &str, dst_container: &str)
    -> Result<(), StoreError>;
}
