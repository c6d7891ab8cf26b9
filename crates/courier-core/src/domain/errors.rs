//! Errors - パイプラインのエラー型と分類
//!
//! Every failure an attempt can hit is one `PipelineError` variant, and every
//! variant classifies into exactly one [`ErrorKind`] and one
//! [`OutcomeKind`](super::outcome::OutcomeKind). There is no escalation
//! between categories.

use std::fmt;

use super::message::{BlobLocation, MessageError};

/// ErrorKind は運用上の分類
///
/// - Transient: backend hiccup; the queue's redelivery will retry it
/// - Permanent: retrying the same item cannot help; acknowledge and move on
/// - Infrastructure: local resource failure; needs an operator, pause the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Why a document was judged malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Not well-formed markup (or not UTF-8 at all).
    NotWellFormed,
    /// Well-formed, but sender or receiver is absent or empty.
    MissingParties,
}

impl MalformedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            MalformedReason::NotWellFormed => "notwellformed",
            MalformedReason::MissingParties => "nopartiesfound",
        }
    }
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the transport process's answer counts as a rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Exited non-zero (`None` when killed by a signal).
    ExitStatus(Option<i32>),
    /// Exited 0 but wrote nothing into the evidence directory.
    NoEvidence,
    /// Exited 0 but an evidence file could not be read.
    UnreadableEvidence { file: String, error: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ExitStatus(Some(code)) => write!(f, "exit code {code}"),
            RejectReason::ExitStatus(None) => f.write_str("terminated by signal"),
            RejectReason::NoEvidence => f.write_str("no evidence produced"),
            RejectReason::UnreadableEvidence { file, error } => {
                write!(f, "evidence {file} unreadable: {error}")
            }
        }
    }
}

/// Failure of one processing attempt.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Queue/storage hiccup other than "not found".
    #[error("backend error during {operation}: {message}")]
    BackendTransient {
        operation: &'static str,
        message: String,
    },

    /// The referenced document no longer exists.
    #[error("document {location} not found")]
    DocumentNotFound { location: BlobLocation },

    /// The queue item itself could not be decoded.
    #[error("invalid queue message: {0}")]
    InvalidMessage(#[from] MessageError),

    /// The document has no usable routing identifiers.
    #[error("malformed document ({reason}): {detail}")]
    MalformedDocument {
        reason: MalformedReason,
        detail: String,
    },

    /// The transport process declined the document.
    #[error("transport rejected the document: {reason}")]
    TransportRejected { reason: RejectReason, output: String },

    /// Local resource failure (scratch space, spawn, timeout).
    #[error("io error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn backend(operation: &'static str, message: impl fmt::Display) -> Self {
        PipelineError::BackendTransient {
            operation,
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::BackendTransient { .. } => ErrorKind::Transient,
            PipelineError::Io { .. } => ErrorKind::Infrastructure,
            PipelineError::DocumentNotFound { .. }
            | PipelineError::InvalidMessage(_)
            | PipelineError::MalformedDocument { .. }
            | PipelineError::TransportRejected { .. } => ErrorKind::Permanent,
        }
    }
}
