use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::{Pipeline, PollLoop, PollSettings};

/// Worker group handle.
/// - every worker runs its own `PollLoop` over the same queue
/// - `request_shutdown()` stops them after their in-flight item
/// - `join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers (at least one).
    pub fn spawn(n: usize, pipeline: Arc<Pipeline>, settings: PollSettings) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let n = n.max(1);
        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let poll_loop = PollLoop::new(worker_id, Arc::clone(&pipeline), settings);
            let rx = shutdown_rx.clone();
            joins.push(tokio::spawn(poll_loop.run(rx)));
        }

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Request shutdown for all workers.
    /// In-flight items finish their disposition; nothing new is started.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all workers without asking them to stop.
    pub async fn join(self) {
        let Self { shutdown_tx, joins } = self;
        for join in joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "worker task failed");
            }
        }
        drop(shutdown_tx);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        self.join().await;
    }
}
