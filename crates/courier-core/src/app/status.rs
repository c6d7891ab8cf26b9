//! Status - poll cycle ごとの集計

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::pipeline::ItemReport;
use crate::domain::{CycleId, OutcomeKind};

/// Per-cycle counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCounts {
    /// Items returned by the queue.
    pub listed: usize,
    pub acknowledged: usize,
    /// Processed but left for redelivery.
    pub left: usize,
    /// Delivered and receipt archived.
    pub delivered: usize,
    /// Malformed or rejected.
    pub failed: usize,
    /// Not started because shutdown was requested.
    pub skipped: usize,
}

/// Result of one `poll_once`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: CycleId,
    pub counts: CycleCounts,
    /// Longest pause any item asked for.
    pub pause: Option<Duration>,
    pub items: Vec<ItemReport>,
}

impl CycleReport {
    pub fn new(cycle: CycleId, listed: usize) -> Self {
        Self {
            cycle,
            counts: CycleCounts {
                listed,
                ..CycleCounts::default()
            },
            pause: None,
            items: Vec::with_capacity(listed),
        }
    }

    pub fn record(&mut self, item: ItemReport) {
        if item.acknowledged {
            self.counts.acknowledged += 1;
        } else {
            self.counts.left += 1;
        }
        if item.outcome == OutcomeKind::Delivered && item.acknowledged {
            self.counts.delivered += 1;
        }
        if item.outcome.is_failed_delivery() {
            self.counts.failed += 1;
        }
        self.pause = self.pause.max(item.pause);
        self.items.push(item);
    }

    pub fn skip_remaining(&mut self) {
        self.counts.skipped = self.counts.listed - self.items.len();
    }

    pub fn is_idle(&self) -> bool {
        self.counts.listed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::DocumentFate;
    use crate::domain::{AttemptId, MessageId, OutcomeKind, Stage};
    use ulid::Ulid;

    fn item(outcome: OutcomeKind, acknowledged: bool, pause: Option<Duration>) -> ItemReport {
        ItemReport {
            message_id: MessageId::new("m"),
            attempt: AttemptId::from_ulid(Ulid::new()),
            outcome,
            stage: Stage::Resolved,
            acknowledged,
            document: DocumentFate::Untouched,
            pause,
        }
    }

    #[test]
    fn counts_and_pause() {
        let mut report = CycleReport::new(CycleId::from_ulid(Ulid::new()), 5);
        report.record(item(OutcomeKind::Delivered, true, None));
        report.record(item(OutcomeKind::Rejected, true, None));
        report.record(item(OutcomeKind::Transient, false, None));
        report.record(item(OutcomeKind::Infrastructure, false, Some(Duration::from_secs(60))));
        report.skip_remaining();

        assert_eq!(
            report.counts,
            CycleCounts {
                listed: 5,
                acknowledged: 2,
                left: 2,
                delivered: 1,
                failed: 1,
                skipped: 1,
            }
        );
        assert_eq!(report.pause, Some(Duration::from_secs(60)));
    }

    #[test]
    fn empty_cycle_is_idle() {
        let report = CycleReport::new(CycleId::from_ulid(Ulid::new()), 0);
        assert!(report.is_idle());
        assert_eq!(report.pause, None);
    }
}
