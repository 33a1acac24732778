//! Offload pool for heavy evaluations
//!
//! A fixed set of tokio tasks pulls requests from one shared queue.
//! Workers only ever see owned snapshots; they cannot reach back into
//! windows, indicators, or the cooldown table, so a crashed worker can
//! never corrupt detector state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::PatternType;
use crate::error::{Result, TickflowError};

use super::handlers::{self, Detection};
use super::snapshot::DetectionSnapshot;

struct EvalRequest {
    pattern: PatternType,
    snapshot: Box<DetectionSnapshot>,
    reply: oneshot::Sender<Option<Detection>>,
}

/// Fixed-size evaluation pool fed through a single bounded queue
pub struct WorkerPool {
    tx: mpsc::Sender<EvalRequest>,
    reply_timeout: Duration,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks; replies slower than `reply_timeout` count
    /// as a worker failure at the call site
    pub fn new(workers: usize, reply_timeout: Duration) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<EvalRequest>(workers * 4);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let request = { rx.lock().await.recv().await };
                        let Some(request) = request else {
                            debug!(worker_id, "eval queue closed, worker exiting");
                            break;
                        };
                        let outcome = handlers::evaluate(request.pattern, &request.snapshot);
                        // Caller may have timed out and dropped the receiver
                        let _ = request.reply.send(outcome);
                    }
                })
            })
            .collect();

        Self {
            tx,
            reply_timeout,
            handles,
        }
    }

    /// Ship the snapshot to a worker and wait for its verdict
    pub async fn evaluate(
        &self,
        pattern: PatternType,
        snapshot: DetectionSnapshot,
    ) -> Result<Option<Detection>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EvalRequest {
                pattern,
                snapshot: Box::new(snapshot),
                reply: reply_tx,
            })
            .await
            .map_err(|_| TickflowError::WorkerUnavailable("eval queue closed".to_string()))?;

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(TickflowError::WorkerUnavailable(
                "worker dropped the reply channel".to_string(),
            )),
            Err(_) => Err(TickflowError::WorkerTimeout(
                self.reply_timeout.as_millis() as u64,
            )),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.handles.len())
            .field("reply_timeout", &self.reply_timeout)
            .finish()
    }
}

/// Log a worker failure at the offload call site; the caller then falls
/// back to the synchronous path
pub(super) fn log_fallback(market: &str, pattern: PatternType, err: &TickflowError) {
    warn!(market, %pattern, error = %err, "worker offload failed, evaluating synchronously");
}
