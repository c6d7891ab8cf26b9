//! PollLoop - キューのポーリングループ
//!
//! # フロー
//! 1. list up to `batch_size` items
//! 2. Pipeline::process each one sequentially (the in-flight item is always
//!    the one bound by this iteration); an item that asks for a pause stops
//!    the batch there
//! 3. sleep `poll_interval`, or `cool_down` when an item asked for a pause
//!
//! Shutdown is a `watch` channel. It is checked before each item and raced
//! against the sleep; an item that has started always finishes its
//! disposition.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::pipeline::Pipeline;
use super::status::CycleReport;
use crate::ports::QueueError;

/// Poll constants. Not configurable at runtime; tests shrink them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub cool_down: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(1),
            cool_down: Duration::from_secs(60),
        }
    }
}

pub struct PollLoop {
    worker_id: usize,
    pipeline: Arc<Pipeline>,
    settings: PollSettings,
}

impl PollLoop {
    pub fn new(worker_id: usize, pipeline: Arc<Pipeline>, settings: PollSettings) -> Self {
        Self {
            worker_id,
            pipeline,
            settings,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// One cycle: list a batch and process it.
    ///
    /// An item that asks for a pause ends the cycle; the rest of the batch is
    /// left on the queue.
    pub async fn poll_once(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleReport, QueueError> {
        let cycle = self.pipeline.ids().generate_cycle_id();
        let items = self.pipeline.receive(self.settings.batch_size).await?;
        let mut report = CycleReport::new(cycle, items.len());

        for item in items {
            if *shutdown.borrow() {
                report.skip_remaining();
                tracing::info!(
                    worker = self.worker_id,
                    %cycle,
                    skipped = report.counts.skipped,
                    "shutdown requested; leaving rest of batch on the queue"
                );
                break;
            }
            let item_report = self.pipeline.process(&item).await;
            let pause = item_report.pause;
            report.record(item_report);

            if pause.is_some() {
                report.skip_remaining();
                if report.counts.skipped > 0 {
                    tracing::warn!(
                        worker = self.worker_id,
                        %cycle,
                        skipped = report.counts.skipped,
                        "infrastructure failure; leaving rest of batch on the queue"
                    );
                }
                break;
            }
        }

        if !report.is_idle() {
            let c = &report.counts;
            tracing::debug!(
                worker = self.worker_id,
                %cycle,
                listed = c.listed,
                acknowledged = c.acknowledged,
                left = c.left,
                delivered = c.delivered,
                failed = c.failed,
                "cycle finished"
            );
        }
        Ok(report)
    }

    /// How long to rest after a cycle.
    pub fn wait_after(&self, report: &Result<CycleReport, QueueError>) -> Duration {
        match report {
            Ok(report) if report.pause.is_some() => self.settings.cool_down,
            _ => self.settings.poll_interval,
        }
    }

    /// Poll until `shutdown` flips to `true` (or its sender goes away).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            worker = self.worker_id,
            queue = self.pipeline.queue_name(),
            "polling for new messages"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = self.poll_once(&shutdown).await;
            if let Err(e) = &result {
                tracing::error!(worker = self.worker_id, error = %e, "listing queue failed");
            }
            let wait = self.wait_after(&result);
            if wait > self.settings.poll_interval {
                tracing::warn!(
                    worker = self.worker_id,
                    ?wait,
                    "pausing after infrastructure failure"
                );
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::info!(worker = self.worker_id, "worker stopped");
    }
}
