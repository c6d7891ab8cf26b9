//! DaemonBuilder - デーモンの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - backends (queue, blob storage, process runner) and transport settings
//!   have no sensible default and must be supplied
//! - build() lists every missing component at once instead of failing on the
//!   first one

use std::sync::Arc;

use super::document_store::DocumentStore;
use super::pipeline::Pipeline;
use super::transport::{TransportInvoker, TransportSettings};
use super::worker_loop::{PollLoop, PollSettings};
use crate::config::Config;
use crate::domain::{DispositionDecider, Policies};
use crate::extract::{ExtractorChain, RoutingScheme};
use crate::ports::{
    BlobStore, DeliveryQueue, IdGenerator, ProcessRunner, SystemClock, UlidGenerator,
};
use crate::worker::WorkerGroup;

/// 使用例
/// ```ignore
/// let daemon = DaemonBuilder::from_config(&config)
///     .queue(Arc::new(queue))
///     .blobs(Arc::new(blobs))
///     .runner(Arc::new(TokioProcessRunner::new()))
///     .build()?;
/// let workers = daemon.spawn();
/// ```
pub struct DaemonBuilder {
    queue: Option<Arc<dyn DeliveryQueue>>,
    blobs: Option<Arc<dyn BlobStore>>,
    runner: Option<Arc<dyn ProcessRunner>>,
    ids: Option<Arc<dyn IdGenerator>>,
    transport: Option<TransportSettings>,
    queue_name: String,
    policies: Policies,
    scheme: RoutingScheme,
    poll: PollSettings,
    workers: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing components: {0:?}. These must be supplied before build().")]
    MissingComponents(Vec<&'static str>),
}

impl DaemonBuilder {
    pub fn new() -> Self {
        Self {
            queue: None,
            blobs: None,
            runner: None,
            ids: None,
            transport: None,
            queue_name: "outbound".to_string(),
            policies: Policies::default(),
            scheme: RoutingScheme::default(),
            poll: PollSettings::default(),
            workers: 1,
        }
    }

    /// Everything configuration decides; backends still have to be supplied.
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .queue_name(config.queue_name.clone())
            .policies(config.policies())
            .routing_scheme(config.routing_scheme)
            .transport(config.transport.clone())
            .workers(config.workers)
    }

    pub fn queue(mut self, queue: Arc<dyn DeliveryQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Defaults to ULIDs from the system clock.
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn transport(mut self, settings: TransportSettings) -> Self {
        self.transport = Some(settings);
        self
    }

    pub fn queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    pub fn policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    pub fn routing_scheme(mut self, scheme: RoutingScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// The cool-down here overrides `Policies::cool_down`.
    pub fn poll_settings(mut self, settings: PollSettings) -> Self {
        self.poll = settings;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn build(self) -> Result<Daemon, BuildError> {
        let mut missing = Vec::new();
        if self.queue.is_none() {
            missing.push("queue");
        }
        if self.blobs.is_none() {
            missing.push("blobs");
        }
        if self.runner.is_none() {
            missing.push("runner");
        }
        if self.transport.is_none() {
            missing.push("transport");
        }
        let (Some(queue), Some(blobs), Some(runner), Some(transport)) =
            (self.queue, self.blobs, self.runner, self.transport)
        else {
            return Err(BuildError::MissingComponents(missing));
        };

        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));
        let policies = Policies {
            cool_down: self.poll.cool_down,
            ..self.policies
        };

        let pipeline = Pipeline::new(
            queue,
            self.queue_name,
            DocumentStore::new(blobs),
            ExtractorChain::for_scheme(self.scheme),
            TransportInvoker::new(transport, runner),
            Arc::new(DispositionDecider::new(policies)),
            ids,
        );

        Ok(Daemon {
            pipeline: Arc::new(pipeline),
            poll: self.poll,
            workers: self.workers.max(1),
        })
    }
}

impl Default for DaemonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A wired daemon, ready to poll.
pub struct Daemon {
    pipeline: Arc<Pipeline>,
    poll: PollSettings,
    workers: usize,
}

impl Daemon {
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// A single loop, for callers that drive cycles themselves.
    pub fn poll_loop(&self, worker_id: usize) -> PollLoop {
        PollLoop::new(worker_id, Arc::clone(&self.pipeline), self.poll)
    }

    pub fn spawn(&self) -> WorkerGroup {
        WorkerGroup::spawn(self.workers, Arc::clone(&self.pipeline), self.poll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryBlobStore, InMemoryDeliveryQueue, TokioProcessRunner};

    #[test]
    fn build_reports_every_missing_component() {
        let result = DaemonBuilder::new()
            .queue(Arc::new(InMemoryDeliveryQueue::new()))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingComponents(missing))
                if missing == vec!["blobs", "runner", "transport"]
        ));
    }

    #[test]
    fn build_success() {
        let daemon = DaemonBuilder::new()
            .queue(Arc::new(InMemoryDeliveryQueue::new()))
            .blobs(Arc::new(InMemoryBlobStore::new()))
            .runner(Arc::new(TokioProcessRunner::new()))
            .transport(TransportSettings::new("/certs/ap.p12"))
            .workers(0)
            .build()
            .unwrap();

        assert_eq!(daemon.workers(), 1);
        assert_eq!(daemon.pipeline().queue_name(), "outbound");
        assert_eq!(daemon.poll_loop(0).settings().batch_size, 10);
    }
}
