//! Stage - 1 件の queue item の処理段階
//!
//! Per-attempt control structure only; nothing here is persisted or visible
//! outside the attempt. It exists so every log line and error can say how far
//! an item got.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Processing stage of one queue item.
///
/// State transitions:
/// - Fetching -> Extracting -> Transporting -> Resolved
/// - any stage -> Resolved (on failure)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Decoding the queue item and downloading the document.
    Fetching,

    /// Recovering sender/receiver from the document.
    Extracting,

    /// Handing the document to the external transport process.
    Transporting,

    /// Outcome known; disposition is being applied.
    Resolved,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Transporting => "transporting",
            Stage::Resolved => "resolved",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
