//! LocalDeliveryQueue - ディレクトリをキューとして使う実装
//!
//! `<root>/<queue>/<message-id>.msg` holds the (base64) message text. Leases
//! are in-process only: a restart makes every message visible again, which is
//! the same thing a hosted queue does once the visibility window lapses.

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use ulid::Ulid;

use super::inmem_delivery::DEFAULT_VISIBILITY;
use crate::domain::{MessageId, PopReceipt, QueueItem};
use crate::ports::{DeliveryQueue, QueueError};

const MESSAGE_EXT: &str = "msg";

#[derive(Debug, Clone)]
struct Lease {
    receipt: PopReceipt,
    visible_at: Instant,
    dequeue_count: u32,
}

#[derive(Clone)]
pub struct LocalDeliveryQueue {
    root: PathBuf,
    visibility: Duration,
    leases: Arc<Mutex<HashMap<(String, MessageId), Lease>>>,
}

impl LocalDeliveryQueue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_visibility(root, DEFAULT_VISIBILITY)
    }

    pub fn with_visibility(root: impl Into<PathBuf>, visibility: Duration) -> Self {
        Self {
            root: root.into(),
            visibility,
            leases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn queue_dir(&self, queue: &str) -> PathBuf {
        self.root.join(queue)
    }

    fn message_file(dir: &Path, id: &MessageId) -> PathBuf {
        dir.join(format!("{}.{MESSAGE_EXT}", id.as_str()))
    }

    pub async fn create_queue(&self, queue: &str) -> Result<(), QueueError> {
        tokio::fs::create_dir_all(self.queue_dir(queue)).await?;
        Ok(())
    }

    /// Enqueue a message text. Written under a temporary name and renamed so
    /// a concurrent `list` never sees a partial file.
    pub async fn push(&self, queue: &str, text: &str) -> Result<MessageId, QueueError> {
        let dir = self.queue_dir(queue);
        tokio::fs::create_dir_all(&dir).await?;

        let id = MessageId::new(Ulid::new().to_string());
        let tmp = dir.join(format!(".{}.tmp", id.as_str()));
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, Self::message_file(&dir, &id)).await?;
        Ok(id)
    }

    /// Message ids in the queue directory, oldest first.
    async fn message_ids(&self, dir: &Path, queue: &str) -> Result<Vec<MessageId>, QueueError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(QueueError::QueueNotFound {
                    queue: queue.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MESSAGE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    ids.push(MessageId::new(stem));
                }
            }
        }
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}

#[async_trait]
impl DeliveryQueue for LocalDeliveryQueue {
    async fn list(&self, queue: &str, max: usize) -> Result<Vec<QueueItem>, QueueError> {
        let dir = self.queue_dir(queue);
        let ids = self.message_ids(&dir, queue).await?;

        let mut leases = self.leases.lock().await;
        let now = Instant::now();
        let mut items = Vec::new();

        for id in ids {
            if items.len() >= max {
                break;
            }
            let key = (queue.to_string(), id.clone());
            let previous = leases.get(&key);
            if previous.is_some_and(|l| l.visible_at > now) {
                continue;
            }

            let text = match tokio::fs::read_to_string(Self::message_file(&dir, &id)).await {
                Ok(text) => text,
                // acknowledged by another worker between listing and reading
                Err(e) if e.kind() == IoErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let lease = Lease {
                receipt: PopReceipt::new(Ulid::new().to_string()),
                visible_at: now + self.visibility,
                dequeue_count: previous.map_or(0, |l| l.dequeue_count) + 1,
            };
            items.push(QueueItem {
                id: id.clone(),
                pop_receipt: lease.receipt.clone(),
                text: text.trim().to_string(),
                dequeue_count: lease.dequeue_count,
            });
            leases.insert(key, lease);
        }
        Ok(items)
    }

    async fn acknowledge(
        &self,
        queue: &str,
        id: &MessageId,
        receipt: &PopReceipt,
    ) -> Result<(), QueueError> {
        let mut leases = self.leases.lock().await;
        let key = (queue.to_string(), id.clone());

        match leases.get(&key) {
            Some(lease) if &lease.receipt == receipt => {}
            Some(_) => return Err(QueueError::ReceiptMismatch { id: id.clone() }),
            None => return Err(QueueError::MessageNotFound { id: id.clone() }),
        }

        let file = Self::message_file(&self.queue_dir(queue), id);
        match tokio::fs::remove_file(&file).await {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                leases.remove(&key);
                return Err(QueueError::MessageNotFound { id: id.clone() });
            }
            Err(e) => return Err(e.into()),
        }
        leases.remove(&key);
        Ok(())
    }
}
