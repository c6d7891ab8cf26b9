//! Decision model: what to do with the queue item and the document once an
//! attempt's outcome is known.
//!
//! The decider is a pure function `(OutcomeKind, Policies) -> DispositionPlan`.
//! Executing the plan (talking to storage and the queue) is the pipeline's job.
//!
//! | Outcome | Steps | Pause |
//! |---|---|---|
//! | Delivered | StoreReceipt, Acknowledge, after-completed action | - |
//! | Malformed / Rejected | Acknowledge, after-failed action | - |
//! | AlreadyGone / InvalidMessage | Acknowledge | - |
//! | Transient | (none) | - |
//! | Infrastructure | (none) | cool-down |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::outcome::OutcomeKind;
use crate::ports::Decider;

/// What to do with a source document after a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AfterPolicy {
    Delete,
    Move,
    Noop,
}

impl AfterPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            AfterPolicy::Delete => "delete",
            AfterPolicy::Move => "move",
            AfterPolicy::Noop => "noop",
        }
    }
}

impl fmt::Display for AfterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown disposition policy '{0}' (expected delete, move or noop)")]
pub struct UnknownPolicy(pub String);

impl FromStr for AfterPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "delete" => Ok(AfterPolicy::Delete),
            "move" => Ok(AfterPolicy::Move),
            "noop" => Ok(AfterPolicy::Noop),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// Disposition configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policies {
    pub after_completed: AfterPolicy,
    pub after_failed: AfterPolicy,
    /// Receipts always go here; delivered documents are moved here.
    pub archive_container: String,
    /// Failed documents are moved here.
    pub failed_container: String,
    /// How long the poll loop rests after an infrastructure failure.
    pub cool_down: Duration,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            after_completed: AfterPolicy::Move,
            after_failed: AfterPolicy::Move,
            archive_container: "archived".to_string(),
            failed_container: "failed".to_string(),
            cool_down: Duration::from_secs(60),
        }
    }
}

/// One side effect of a disposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Write the evidence next to the archived document name.
    StoreReceipt { container: String },
    /// Remove the item from the queue.
    Acknowledge,
    /// Delete the source document.
    DeleteDocument,
    /// Copy the source document to `to`, then delete the original.
    MoveDocument { to: String },
}

impl Step {
    pub fn is_document_action(&self) -> bool {
        matches!(self, Step::DeleteDocument | Step::MoveDocument { .. })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::StoreReceipt { container } => write!(f, "store receipt in {container}"),
            Step::Acknowledge => f.write_str("acknowledge"),
            Step::DeleteDocument => f.write_str("delete document"),
            Step::MoveDocument { to } => write!(f, "move document to {to}"),
        }
    }
}

/// Ordered side effects for one queue item plus an optional loop pause.
///
/// Steps must be applied in order, and a failed step stops the ones after
/// it: no acknowledgment without the receipt, no document action without the
/// acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispositionPlan {
    pub steps: Vec<Step>,
    pub pause: Option<Duration>,
}

impl DispositionPlan {
    /// Leave the item on the queue and do nothing else.
    pub fn leave() -> Self {
        Self::default()
    }

    pub fn acknowledges(&self) -> bool {
        self.steps.contains(&Step::Acknowledge)
    }

    pub fn document_action(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.is_document_action())
    }
}

/// The disposition engine.
#[derive(Debug, Clone)]
pub struct DispositionDecider {
    policies: Policies,
}

impl DispositionDecider {
    pub fn new(policies: Policies) -> Self {
        Self { policies }
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    fn document_step(policy: AfterPolicy, target: &str) -> Option<Step> {
        match policy {
            AfterPolicy::Delete => Some(Step::DeleteDocument),
            AfterPolicy::Move => Some(Step::MoveDocument {
                to: target.to_string(),
            }),
            AfterPolicy::Noop => None,
        }
    }
}

impl Decider for DispositionDecider {
    fn decide(&self, outcome: OutcomeKind) -> DispositionPlan {
        let p = &self.policies;
        match outcome {
            OutcomeKind::Delivered => {
                let mut steps = vec![
                    Step::StoreReceipt {
                        container: p.archive_container.clone(),
                    },
                    Step::Acknowledge,
                ];
                steps.extend(Self::document_step(p.after_completed, &p.archive_container));
                DispositionPlan { steps, pause: None }
            }
            OutcomeKind::Malformed | OutcomeKind::Rejected => {
                let mut steps = vec![Step::Acknowledge];
                steps.extend(Self::document_step(p.after_failed, &p.failed_container));
                DispositionPlan { steps, pause: None }
            }
            OutcomeKind::AlreadyGone | OutcomeKind::InvalidMessage => DispositionPlan {
                steps: vec![Step::Acknowledge],
                pause: None,
            },
            OutcomeKind::Transient => DispositionPlan::leave(),
            OutcomeKind::Infrastructure => DispositionPlan {
                steps: Vec::new(),
                pause: Some(p.cool_down),
            },
        }
    }
}
