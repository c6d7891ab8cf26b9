//! DeliveryQueue port - work queue of outbound document notifications.
//!
//! # 設計原則
//! - `list` hides the returned messages for a visibility window and stamps
//!   each delivery with a fresh pop receipt
//! - a message that is never acknowledged becomes visible again (redelivery)
//! - `acknowledge` needs the receipt of the current delivery

use async_trait::async_trait;

use crate::domain::{MessageId, PopReceipt, QueueItem};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue {queue} does not exist")]
    QueueNotFound { queue: String },

    #[error("message {id} not found")]
    MessageNotFound { id: MessageId },

    #[error("pop receipt for message {id} no longer matches (message was redelivered)")]
    ReceiptMismatch { id: MessageId },

    #[error("queue operation failed: {0}")]
    OperationFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Queue backend contract.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Receive up to `max` visible messages.
    async fn list(&self, queue: &str, max: usize) -> Result<Vec<QueueItem>, QueueError>;

    /// Delete a message for good.
    async fn acknowledge(
        &self,
        queue: &str,
        id: &MessageId,
        receipt: &PopReceipt,
    ) -> Result<(), QueueError>;
}
