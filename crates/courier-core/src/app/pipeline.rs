//! Pipeline - 1 件の queue item を最後まで処理する
//!
//! # フロー
//! 1. decode the document reference from the item
//! 2. fetch the document (Stage::Fetching)
//! 3. extract routing identifiers (Stage::Extracting)
//! 4. invoke the transport (Stage::Transporting)
//! 5. Decider: OutcomeKind -> DispositionPlan (Stage::Resolved)
//! 6. apply the plan in order, stopping at the first failed queue/receipt step
//!
//! Every failure is caught here; nothing escapes `process`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use super::document_store::DocumentStore;
use super::transport::TransportInvoker;
use crate::domain::{
    AttemptId, BlobLocation, DispositionPlan, Evidence, MessageId, Outcome, OutcomeKind,
    PipelineError, QueueItem, Stage, Step,
};
use crate::extract::ExtractorChain;
use crate::ports::{Decider, DeliveryQueue, IdGenerator, QueueError};

/// What happened to the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFate {
    Untouched,
    Deleted,
    Moved { to: String },
    /// The document step found nothing to act on.
    AlreadyGone,
}

impl fmt::Display for DocumentFate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFate::Untouched => f.write_str("untouched"),
            DocumentFate::Deleted => f.write_str("deleted"),
            DocumentFate::Moved { to } => write!(f, "moved to {to}"),
            DocumentFate::AlreadyGone => f.write_str("already gone"),
        }
    }
}

/// Result of processing one queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub message_id: MessageId,
    pub attempt: AttemptId,
    pub outcome: OutcomeKind,
    /// Where the attempt stopped (`Resolved` for successful deliveries).
    pub stage: Stage,
    pub acknowledged: bool,
    pub document: DocumentFate,
    pub pause: Option<Duration>,
}

pub struct Pipeline {
    queue: Arc<dyn DeliveryQueue>,
    queue_name: String,
    documents: DocumentStore,
    extractors: ExtractorChain,
    transport: TransportInvoker,
    decider: Arc<dyn Decider>,
    ids: Arc<dyn IdGenerator>,
}

impl Pipeline {
    pub fn new(
        queue: Arc<dyn DeliveryQueue>,
        queue_name: impl Into<String>,
        documents: DocumentStore,
        extractors: ExtractorChain,
        transport: TransportInvoker,
        decider: Arc<dyn Decider>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            documents,
            extractors,
            transport,
            decider,
            ids,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        &self.ids
    }

    /// Pull up to `max` items off the queue.
    pub async fn receive(&self, max: usize) -> Result<Vec<QueueItem>, QueueError> {
        self.queue.list(&self.queue_name, max).await
    }

    /// Process one item end to end, disposition included.
    pub async fn process(&self, item: &QueueItem) -> ItemReport {
        let attempt = self.ids.generate_attempt_id();
        let span = tracing::info_span!(
            "item",
            message_id = %item.id,
            %attempt,
            dequeue_count = item.dequeue_count
        );
        self.process_attempt(item, attempt).instrument(span).await
    }

    async fn process_attempt(&self, item: &QueueItem, attempt: AttemptId) -> ItemReport {
        let mut stage = Stage::Fetching;

        let (location, outcome) = match item.document_location() {
            Ok(location) => {
                let outcome = Outcome::from(self.deliver(&location, attempt, &mut stage).await);
                (Some(location), outcome)
            }
            Err(e) => (None, Outcome::Failed(PipelineError::from(e))),
        };

        let kind = outcome.kind();
        match outcome.error() {
            None => tracing::info!(outcome = ?kind, "document delivered"),
            Some(err @ PipelineError::DocumentNotFound { .. }) => {
                tracing::warn!(%stage, error = %err, "document already gone")
            }
            Some(err) => tracing::error!(
                %stage,
                outcome = ?kind,
                error = %err,
                error_kind = ?err.kind(),
                "processing failed"
            ),
        }
        if outcome.error().is_none() {
            stage = Stage::Resolved;
        }

        let plan = self.decider.decide(kind);
        let (acknowledged, document) = self
            .apply(item, &plan, location.as_ref(), outcome.evidence())
            .await;

        ItemReport {
            message_id: item.id.clone(),
            attempt,
            outcome: kind,
            stage,
            acknowledged,
            document,
            pause: plan.pause,
        }
    }

    /// Fetch, extract, transport. `stage` tracks how far the attempt got.
    async fn deliver(
        &self,
        location: &BlobLocation,
        attempt: AttemptId,
        stage: &mut Stage,
    ) -> Result<Evidence, PipelineError> {
        *stage = Stage::Fetching;
        let document = self.documents.fetch(location).await?;

        *stage = Stage::Extracting;
        let routing = self.extractors.extract(&document)?;

        *stage = Stage::Transporting;
        self.transport.send(attempt, &document, &routing).await
    }

    /// Apply `plan` step by step.
    ///
    /// A failed receipt or acknowledgment stops the remaining steps; a failed
    /// document step is only logged.
    async fn apply(
        &self,
        item: &QueueItem,
        plan: &DispositionPlan,
        location: Option<&BlobLocation>,
        evidence: Option<&Evidence>,
    ) -> (bool, DocumentFate) {
        let mut acknowledged = false;
        let mut document = DocumentFate::Untouched;

        if plan.steps.is_empty() {
            tracing::info!(pause = ?plan.pause, "leaving item on the queue");
        }

        for step in &plan.steps {
            match step {
                Step::StoreReceipt { container } => {
                    let (Some(location), Some(evidence)) = (location, evidence) else {
                        tracing::error!(
                            %step,
                            "no document or evidence to store; leaving item on the queue"
                        );
                        break;
                    };
                    if let Err(e) = self
                        .documents
                        .store_receipt(location, container, evidence)
                        .await
                    {
                        tracing::error!(
                            %step,
                            error = %e,
                            "storing receipt failed; leaving item on the queue"
                        );
                        break;
                    }
                }
                Step::Acknowledge => {
                    tracing::info!(pop_receipt = %item.pop_receipt, "acknowledging queue item");
                    if let Err(e) = self
                        .queue
                        .acknowledge(&self.queue_name, &item.id, &item.pop_receipt)
                        .await
                    {
                        tracing::error!(
                            %step,
                            error = %e,
                            "acknowledging failed; document left in place"
                        );
                        break;
                    }
                    acknowledged = true;
                }
                Step::DeleteDocument | Step::MoveDocument { .. } => {
                    let Some(location) = location else {
                        continue;
                    };
                    let result = match step {
                        Step::MoveDocument { to } => self
                            .documents
                            .move_to(location, to)
                            .await
                            .map(|()| DocumentFate::Moved { to: to.clone() }),
                        _ => self
                            .documents
                            .delete(location)
                            .await
                            .map(|()| DocumentFate::Deleted),
                    };
                    match result {
                        Ok(fate) => document = fate,
                        Err(e) if e.is_not_found() => {
                            tracing::info!(%step, %location, "document already handled");
                            document = DocumentFate::AlreadyGone;
                        }
                        Err(e) => {
                            tracing::error!(%step, %location, error = %e, "document step failed")
                        }
                    }
                }
            }
        }

        tracing::debug!(acknowledged, %document, "disposition applied");
        (acknowledged, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::transport::TransportSettings;
    use crate::domain::{DispositionDecider, Policies, encode_message_text};
    use crate::impls::{InMemoryBlobStore, InMemoryDeliveryQueue};
    use crate::ports::{
        BlobStore, ProcessError, ProcessOutput, ProcessRunner, ProcessSpec, SystemClock,
        UlidGenerator,
    };
    use async_trait::async_trait;
    use std::path::PathBuf;

    const SBD: &str = r#"<StandardBusinessDocument><StandardBusinessDocumentHeader>
        <Sender><Identifier>0192:111</Identifier></Sender>
        <Receiver><Identifier>0192:222</Identifier></Receiver>
      </StandardBusinessDocumentHeader></StandardBusinessDocument>"#;

    struct AcceptingRunner;

    #[async_trait]
    impl ProcessRunner for AcceptingRunner {
        async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
            let dir = PathBuf::from(spec.flag_value("-e").unwrap());
            std::fs::write(dir.join("receipt.xml"), "<receipt/>").unwrap();
            Ok(ProcessOutput {
                exit_code: Some(0),
                ..ProcessOutput::default()
            })
        }
    }

    struct Fixture {
        queue: InMemoryDeliveryQueue,
        blobs: InMemoryBlobStore,
        pipeline: Pipeline,
        _scratch: tempfile::TempDir,
    }

    fn fixture(policies: Policies) -> Fixture {
        let scratch = tempfile::tempdir().unwrap();
        let queue = InMemoryDeliveryQueue::new();
        let blobs = InMemoryBlobStore::new();
        let transport = TransportInvoker::new(
            TransportSettings::new("/certs/ap.p12").with_scratch_dir(scratch.path()),
            Arc::new(AcceptingRunner),
        );
        let pipeline = Pipeline::new(
            Arc::new(queue.clone()),
            "outbound",
            DocumentStore::new(Arc::new(blobs.clone())),
            ExtractorChain::default(),
            transport,
            Arc::new(DispositionDecider::new(policies)),
            Arc::new(UlidGenerator::new(SystemClock)),
        );
        Fixture {
            queue,
            blobs,
            pipeline,
            _scratch: scratch,
        }
    }

    async fn enqueue(f: &Fixture, path: &str) -> QueueItem {
        f.queue
            .push(
                "outbound",
                encode_message_text(&format!("https://acct.blob.core.windows.net/outbound/{path}")),
            )
            .await;
        f.pipeline.receive(1).await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn delivered_document_is_archived_with_receipt() {
        let f = fixture(Policies::default());
        f.blobs.put("outbound", "inv.xml", SBD.as_bytes()).await.unwrap();
        let item = enqueue(&f, "inv.xml").await;

        let report = f.pipeline.process(&item).await;

        assert_eq!(report.outcome, OutcomeKind::Delivered);
        assert_eq!(report.stage, Stage::Resolved);
        assert!(report.acknowledged);
        assert_eq!(report.document, DocumentFate::Moved { to: "archived".to_string() });
        assert!(f.blobs.contains("archived", "inv.xml").await);
        assert_eq!(
            f.blobs.get("archived", "inv.xml_receipt.xml").await.unwrap(),
            b"<receipt/>"
        );
        assert!(f.queue.is_empty("outbound").await);
    }

    #[tokio::test]
    async fn failure_stage_is_reported() {
        let f = fixture(Policies::default());
        f.blobs.put("outbound", "bad.xml", b"<oops").await.unwrap();
        let item = enqueue(&f, "bad.xml").await;

        let report = f.pipeline.process(&item).await;

        assert_eq!(report.outcome, OutcomeKind::Malformed);
        assert_eq!(report.stage, Stage::Extracting);
        assert_eq!(report.document, DocumentFate::Moved { to: "failed".to_string() });
    }

    #[tokio::test]
    async fn undecodable_item_is_acknowledged_without_document_action() {
        let f = fixture(Policies::default());
        f.queue.push("outbound", "*** not base64 ***").await;
        let item = f.pipeline.receive(1).await.unwrap().remove(0);

        let report = f.pipeline.process(&item).await;

        assert_eq!(report.outcome, OutcomeKind::InvalidMessage);
        assert!(report.acknowledged);
        assert_eq!(report.document, DocumentFate::Untouched);
    }

    #[tokio::test]
    async fn stale_receipt_skips_document_step() {
        let f = fixture(Policies::default());
        f.blobs.put("outbound", "bad.xml", b"<oops").await.unwrap();
        let mut item = enqueue(&f, "bad.xml").await;
        item.pop_receipt = crate::domain::PopReceipt::new("stale");

        let report = f.pipeline.process(&item).await;

        assert_eq!(report.outcome, OutcomeKind::Malformed);
        assert!(!report.acknowledged);
        assert_eq!(report.document, DocumentFate::Untouched);
        assert!(f.blobs.contains("outbound", "bad.xml").await);
    }
}
