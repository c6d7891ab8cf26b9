//! Domain model (IDs, queue items, routing, outcomes, decisions, errors).
//!
//! Nothing in here performs I/O. The disposition table lives in
//! [`decision`] as a pure function so it can be tested without triggering
//! real failures.

pub mod decision;
pub mod errors;
pub mod ids;
pub mod message;
pub mod outcome;
pub mod routing;
pub mod state;

pub use decision::{AfterPolicy, DispositionDecider, DispositionPlan, Policies, Step, UnknownPolicy};
pub use errors::{ErrorKind, MalformedReason, PipelineError, RejectReason};
pub use ids::{AttemptId, CycleId, MessageId, PopReceipt};
pub use message::{BlobLocation, MessageError, QueueItem, RECEIPT_SUFFIX, encode_message_text};
pub use outcome::{Evidence, Outcome, OutcomeKind};
pub use routing::RoutingIdentifiers;
pub use state::Stage;
