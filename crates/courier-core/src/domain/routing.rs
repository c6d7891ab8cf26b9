//! Routing identifiers: who sends, who receives.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sender/receiver endpoint identifiers recovered from a document.
///
/// Both are required before transport can be attempted. Values are kept as
/// they appear in the document (e.g. `0192:987654321`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingIdentifiers {
    pub sender: String,
    pub receiver: String,
}

impl RoutingIdentifiers {
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
        }
    }
}

impl fmt::Display for RoutingIdentifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.sender, self.receiver)
    }
}
