//! 接続文字列から queue / blob storage の実装を選ぶ

use std::sync::Arc;

use courier_core::Backend;
use courier_core::impls::{
    InMemoryBlobStore, InMemoryDeliveryQueue, LocalBlobStore, LocalDeliveryQueue,
};
use courier_core::ports::{BlobStore, DeliveryQueue, QueueError};

pub struct Backends {
    pub queue: Arc<dyn DeliveryQueue>,
    pub blobs: Arc<dyn BlobStore>,
}

/// Open the backend and make sure the work queue exists.
pub async fn open(backend: &Backend, queue_name: &str) -> Result<Backends, QueueError> {
    match backend {
        Backend::Local { root } => {
            let queue = LocalDeliveryQueue::new(root.join("queues"));
            queue.create_queue(queue_name).await?;
            tracing::info!(root = %root.display(), "using local storage");
            Ok(Backends {
                queue: Arc::new(queue),
                blobs: Arc::new(LocalBlobStore::new(root.join("blobs"))),
            })
        }
        Backend::Memory => {
            let queue = InMemoryDeliveryQueue::new();
            queue.create_queue(queue_name).await;
            tracing::warn!("using in-memory storage; nothing survives a restart");
            Ok(Backends {
                queue: Arc::new(queue),
                blobs: Arc::new(InMemoryBlobStore::new()),
            })
        }
    }
}
