//! DocumentStore - blob storage 上の document / receipt 操作
//!
//! Thin layer over [`BlobStore`] that speaks [`BlobLocation`]s and maps
//! storage errors onto the pipeline taxonomy where the pipeline needs it.

use std::sync::Arc;

use crate::domain::{BlobLocation, Evidence, MessageError, PipelineError};
use crate::ports::{BlobStore, StoreError};

#[derive(Clone)]
pub struct DocumentStore {
    blobs: Arc<dyn BlobStore>,
}

impl DocumentStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Download the document.
    ///
    /// - missing blob: `DocumentNotFound`
    /// - a path the backend refuses: `InvalidMessage` (the reference itself is bad)
    /// - anything else: `BackendTransient`
    pub async fn fetch(&self, location: &BlobLocation) -> Result<Vec<u8>, PipelineError> {
        tracing::info!(
            container = %location.container,
            path = %location.path,
            "downloading document"
        );
        self.blobs
            .get(&location.container, &location.path)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => PipelineError::DocumentNotFound {
                    location: location.clone(),
                },
                StoreError::InvalidPath(path) => {
                    PipelineError::InvalidMessage(MessageError::InvalidUrl(path))
                }
                other => PipelineError::backend("fetch", other),
            })
    }

    /// Write `evidence` as `<archive>/<document path>_receipt.xml`.
    pub async fn store_receipt(
        &self,
        location: &BlobLocation,
        archive_container: &str,
        evidence: &Evidence,
    ) -> Result<BlobLocation, StoreError> {
        let receipt = location.receipt_location(archive_container);
        tracing::info!(
            container = %receipt.container,
            path = %receipt.path,
            bytes = evidence.len(),
            "storing receipt"
        );
        self.blobs
            .put(&receipt.container, &receipt.path, evidence.as_bytes())
            .await?;
        Ok(receipt)
    }

    pub async fn delete(&self, location: &BlobLocation) -> Result<(), StoreError> {
        tracing::info!(container = %location.container, path = %location.path, "deleting document");
        self.blobs.delete(&location.container, &location.path).await
    }

    /// Copy into `container` under the same path, then delete the original.
    ///
    /// Not atomic: if the delete fails the document exists in both places.
    pub async fn move_to(
        &self,
        location: &BlobLocation,
        container: &str,
    ) -> Result<(), StoreError> {
        tracing::info!(
            from = %location.container,
            to = container,
            path = %location.path,
            "moving document"
        );
        self.blobs
            .copy(&location.container, &location.path, container)
            .await?;
        self.blobs.delete(&location.container, &location.path).await
    }
}
