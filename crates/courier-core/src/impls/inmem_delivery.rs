//! InMemoryDeliveryQueue - 開発・テスト用の配送キュー
//!
//! Emulates the redelivery semantics of a hosted queue:
//! - `list` hides returned messages for `visibility` and stamps a new receipt
//! - an un-acknowledged message is handed out again once `visibility` passes
//! - `acknowledge` only works with the receipt of the latest delivery

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::domain::{MessageId, PopReceipt, QueueItem};
use crate::ports::{DeliveryQueue, QueueError};

/// Default time a listed message stays hidden (matches common hosted queues).
pub const DEFAULT_VISIBILITY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct StoredMessage {
    id: MessageId,
    text: String,
    visible_at: Instant,
    receipt: Option<PopReceipt>,
    dequeue_count: u32,
}

/// In-memory queue keyed by queue name.
#[derive(Clone)]
pub struct InMemoryDeliveryQueue {
    queues: Arc<Mutex<HashMap<String, VecDeque<StoredMessage>>>>,
    visibility: Duration,
}

impl InMemoryDeliveryQueue {
    pub fn new() -> Self {
        Self::with_visibility(DEFAULT_VISIBILITY)
    }

    pub fn with_visibility(visibility: Duration) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            visibility,
        }
    }

    /// Create `queue` if it does not exist yet.
    pub async fn create_queue(&self, queue: &str) {
        let mut queues = self.queues.lock().await;
        queues.entry(queue.to_string()).or_default();
    }

    /// Enqueue a message text (creating the queue on demand).
    pub async fn push(&self, queue: &str, text: impl Into<String>) -> MessageId {
        let id = MessageId::new(Ulid::new().to_string());
        let message = StoredMessage {
            id: id.clone(),
            text: text.into(),
            visible_at: Instant::now(),
            receipt: None,
            dequeue_count: 0,
        };
        let mut queues = self.queues.lock().await;
        queues.entry(queue.to_string()).or_default().push_back(message);
        id
    }

    /// Messages still on the queue, visible or not.
    pub async fn len(&self, queue: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.get(queue).map_or(0, VecDeque::len)
    }

    pub async fn is_empty(&self, queue: &str) -> bool {
        self.len(queue).await == 0
    }

    /// Whether a message with this id is still on the queue.
    pub async fn contains(&self, queue: &str, id: &MessageId) -> bool {
        let queues = self.queues.lock().await;
        queues
            .get(queue)
            .is_some_and(|q| q.iter().any(|m| &m.id == id))
    }
}

impl Default for InMemoryDeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryDeliveryQueue {
    async fn list(&self, queue: &str, max: usize) -> Result<Vec<QueueItem>, QueueError> {
        let mut queues = self.queues.lock().await;
        let messages = queues.get_mut(queue).ok_or_else(|| QueueError::QueueNotFound {
            queue: queue.to_string(),
        })?;

        let now = Instant::now();
        let mut items = Vec::new();
        for message in messages.iter_mut() {
            if items.len() >= max {
                break;
            }
            if message.visible_at > now {
                continue;
            }
            let receipt = PopReceipt::new(Ulid::new().to_string());
            message.receipt = Some(receipt.clone());
            message.visible_at = now + self.visibility;
            message.dequeue_count += 1;

            items.push(QueueItem {
                id: message.id.clone(),
                pop_receipt: receipt,
                text: message.text.clone(),
                dequeue_count: message.dequeue_count,
            });
        }
        Ok(items)
    }

    async fn acknowledge(
        &self,
        queue: &str,
        id: &MessageId,
        receipt: &PopReceipt,
    ) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().await;
        let messages = queues.get_mut(queue).ok_or_else(|| QueueError::QueueNotFound {
            queue: queue.to_string(),
        })?;

        let Some(pos) = messages.iter().position(|m| &m.id == id) else {
            return Err(QueueError::MessageNotFound { id: id.clone() });
        };
        if messages[pos].receipt.as_ref() != Some(receipt) {
            return Err(QueueError::ReceiptMismatch { id: id.clone() });
        }
        messages.remove(pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_hides_messages_until_visibility_passes() {
        let queue = InMemoryDeliveryQueue::new();
        queue.push("outbound", "a").await;
        queue.push("outbound", "b").await;

        let first = queue.list("outbound", 10).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].text, "a");
        assert_eq!(first[0].dequeue_count, 1);

        let second = queue.list("outbound", 10).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(queue.len("outbound").await, 2);
    }

    #[tokio::test]
    async fn list_respects_max() {
        let queue = InMemoryDeliveryQueue::new();
        for i in 0..15 {
            queue.push("outbound", format!("m{i}")).await;
        }
        assert_eq!(queue.list("outbound", 10).await.unwrap().len(), 10);
        assert_eq!(queue.list("outbound", 10).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unacknowledged_message_is_redelivered_with_new_receipt() {
        let queue = InMemoryDeliveryQueue::with_visibility(Duration::ZERO);
        queue.push("outbound", "a").await;

        let first = queue.list("outbound", 1).await.unwrap().remove(0);
        let second = queue.list("outbound", 1).await.unwrap().remove(0);

        assert_eq!(first.id, second.id);
        assert_ne!(first.pop_receipt, second.pop_receipt);
        assert_eq!(second.dequeue_count, 2);

        let stale = queue
            .acknowledge("outbound", &first.id, &first.pop_receipt)
            .await;
        assert!(matches!(stale, Err(QueueError::ReceiptMismatch { .. })));

        queue
            .acknowledge("outbound", &second.id, &second.pop_receipt)
            .await
            .unwrap();
        assert!(queue.is_empty("outbound").await);
    }

    #[tokio::test]
    async fn acknowledge_twice_reports_missing_message() {
        let queue = InMemoryDeliveryQueue::new();
        queue.push("outbound", "a").await;
        let item = queue.list("outbound", 1).await.unwrap().remove(0);

        queue
            .acknowledge("outbound", &item.id, &item.pop_receipt)
            .await
            .unwrap();
        let again = queue
            .acknowledge("outbound", &item.id, &item.pop_receipt)
            .await;
        assert!(matches!(again, Err(QueueError::MessageNotFound { .. })));
    }

    #[tokio::test]
    async fn unknown_queue_is_an_error() {
        let queue = InMemoryDeliveryQueue::new();
        assert!(matches!(
            queue.list("nope", 1).await,
            Err(QueueError::QueueNotFound { .. })
        ));

        queue.create_queue("nope").await;
        assert!(queue.list("nope", 1).await.unwrap().is_empty());
    }
}
