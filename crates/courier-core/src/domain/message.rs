//! Queue items and the document references they carry.
//!
//! A queue item's text is base64 of a JSON event whose `data.url` points at
//! the outbound document in blob storage:
//!
//! ```text
//! {"data":{"url":"https://account.blob.core.windows.net/outbound/2024/01/invoice.xml"}}
//! ```
//!
//! The URL path is split on `/`: the first segment is the container, the rest
//! (re-joined) is the blob path.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::ids::{MessageId, PopReceipt};

/// Suffix appended to a document's blob name to name its receipt.
pub const RECEIPT_SUFFIX: &str = "_receipt.xml";

/// One unit of work pulled from the queue.
///
/// The daemon only borrows it for the duration of one attempt; the queue keeps
/// ownership until the item is acknowledged with its `pop_receipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: MessageId,
    pub pop_receipt: PopReceipt,
    /// Raw (still encoded) message text.
    pub text: String,
    /// How many times the queue has handed this message out, this delivery included.
    pub dequeue_count: u32,
}

impl QueueItem {
    pub fn new(id: MessageId, pop_receipt: PopReceipt, text: impl Into<String>) -> Self {
        Self {
            id,
            pop_receipt,
            text: text.into(),
            dequeue_count: 1,
        }
    }

    /// Decode the document reference carried by this item.
    pub fn document_location(&self) -> Result<BlobLocation, MessageError> {
        let decoded = STANDARD
            .decode(self.text.trim())
            .map_err(|e| MessageError::InvalidBase64(e.to_string()))?;
        let event: BlobEvent = serde_json::from_slice(&decoded)
            .map_err(|e| MessageError::InvalidJson(e.to_string()))?;
        BlobLocation::from_url(&event.data.url)
    }
}

/// Encode a document URL the way producers put it on the queue.
///
/// Used by tests and by tooling that seeds local queues.
pub fn encode_message_text(url: &str) -> String {
    let event = serde_json::json!({ "data": { "url": url } });
    STANDARD.encode(event.to_string())
}

#[derive(Debug, Deserialize)]
struct BlobEvent {
    data: BlobEventData,
}

#[derive(Debug, Deserialize)]
struct BlobEventData {
    url: String,
}

/// A container + path pair in blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobLocation {
    pub container: String,
    pub path: String,
}

impl BlobLocation {
    pub fn new(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            path: path.into(),
        }
    }

    /// Parse `scheme://host/container/some/path` (or a bare `/container/path`).
    ///
    /// Query strings and fragments are ignored.
    pub fn from_url(url: &str) -> Result<Self, MessageError> {
        let without_scheme = match url.find("://") {
            Some(idx) => {
                let rest = &url[idx + 3..];
                match rest.find('/') {
                    Some(slash) => &rest[slash..],
                    None => "",
                }
            }
            None => url,
        };
        let path = without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_start_matches('/');

        let mut segments = path.splitn(2, '/');
        let container = segments.next().unwrap_or_default();
        let blob = segments.next().unwrap_or_default();

        if container.is_empty() || blob.is_empty() {
            return Err(MessageError::InvalidUrl(url.to_string()));
        }
        Ok(Self::new(container, blob))
    }

    /// Where the receipt for this document goes: same blob name plus
    /// [`RECEIPT_SUFFIX`], inside `archive_container`.
    pub fn receipt_location(&self, archive_container: &str) -> BlobLocation {
        BlobLocation::new(archive_container, format!("{}{}", self.path, RECEIPT_SUFFIX))
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.path)
    }
}

/// Why a queue item's text could not be turned into a [`BlobLocation`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("message text is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("message payload is not a blob event: {0}")]
    InvalidJson(String),

    #[error("document url has no container/path: {0}")]
    InvalidUrl(String),
}
