//! Outcome model: the result of one processing attempt.
//!
//! An attempt ends either with evidence from the transport process or with a
//! [`PipelineError`]. [`OutcomeKind`] is the coarse category the disposition
//! engine decides on; it carries no payload so deciding stays a pure function.

use serde::{Deserialize, Serialize};

use super::errors::PipelineError;

/// Terminal category of an attempt.
///
/// Serialized as SCREAMING_SNAKE_CASE for log/report consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    /// Transport accepted the document and produced evidence.
    Delivered,
    /// The referenced document was already gone.
    AlreadyGone,
    /// The queue item could not be decoded.
    InvalidMessage,
    /// The document has no usable routing identifiers.
    Malformed,
    /// The transport process declined the document.
    Rejected,
    /// Backend hiccup; leave the item for redelivery.
    Transient,
    /// Local resource failure; leave the item and pause.
    Infrastructure,
}

impl OutcomeKind {
    /// Failures whose document gets the "after failed" treatment.
    pub fn is_failed_delivery(self) -> bool {
        matches!(self, OutcomeKind::Malformed | OutcomeKind::Rejected)
    }
}

/// Proof-of-transport bytes produced by the transport process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence(Vec<u8>);

impl Evidence {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What one attempt produced.
#[derive(Debug)]
pub enum Outcome {
    Delivered(Evidence),
    Failed(PipelineError),
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Delivered(_) => OutcomeKind::Delivered,
            Outcome::Failed(err) => OutcomeKind::from(err),
        }
    }

    pub fn evidence(&self) -> Option<&Evidence> {
        match self {
            Outcome::Delivered(evidence) => Some(evidence),
            Outcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Outcome::Delivered(_) => None,
            Outcome::Failed(err) => Some(err),
        }
    }
}

impl From<Result<Evidence, PipelineError>> for Outcome {
    fn from(result: Result<Evidence, PipelineError>) -> Self {
        match result {
            Ok(evidence) => Outcome::Delivered(evidence),
            Err(err) => Outcome::Failed(err),
        }
    }
}

impl From<&PipelineError> for OutcomeKind {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::BackendTransient { .. } => OutcomeKind::Transient,
            PipelineError::DocumentNotFound { .. } => OutcomeKind::AlreadyGone,
            PipelineError::InvalidMessage(_) => OutcomeKind::InvalidMessage,
            PipelineError::MalformedDocument { .. } => OutcomeKind::Malformed,
            PipelineError::TransportRejected { .. } => OutcomeKind::Rejected,
            PipelineError::Io { .. } => OutcomeKind::Infrastructure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{MalformedReason, RejectReason};
    use crate::domain::message::{BlobLocation, MessageError};

    #[test]
    fn outcome_kind_serializes_as_screaming_snake() {
        let s = serde_json::to_string(&OutcomeKind::AlreadyGone).unwrap();
        assert_eq!(s, "\"ALREADY_GONE\"");

        let s = serde_json::to_string(&OutcomeKind::Delivered).unwrap();
        assert_eq!(s, "\"DELIVERED\"");
    }

    #[test]
    fn every_error_maps_to_one_kind() {
        let cases = [
            (PipelineError::backend("list", "timeout"), OutcomeKind::Transient),
            (
                PipelineError::DocumentNotFound {
                    location: BlobLocation::new("c", "p"),
                },
                OutcomeKind::AlreadyGone,
            ),
            (
                PipelineError::InvalidMessage(MessageError::InvalidUrl("x".into())),
                OutcomeKind::InvalidMessage,
            ),
            (
                PipelineError::MalformedDocument {
                    reason: MalformedReason::NotWellFormed,
                    detail: String::new(),
                },
                OutcomeKind::Malformed,
            ),
            (
                PipelineError::TransportRejected {
                    reason: RejectReason::NoEvidence,
                    output: String::new(),
                },
                OutcomeKind::Rejected,
            ),
            (
                PipelineError::io("mkdir", std::io::Error::other("denied")),
                OutcomeKind::Infrastructure,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(Outcome::Failed(err).kind(), expected);
        }
    }

    #[test]
    fn delivered_outcome_exposes_evidence() {
        let outcome = Outcome::from(Ok(Evidence::new(b"<receipt/>".to_vec())));
        assert_eq!(outcome.kind(), OutcomeKind::Delivered);
        assert_eq!(outcome.evidence().map(Evidence::len), Some(10));
        assert!(outcome.error().is_none());
    }
}
