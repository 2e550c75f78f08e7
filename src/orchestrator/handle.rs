//! Control surface for a running orchestration.

use crate::execution::{ProgressSnapshot, StepExecutor};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Retry requests, each naming the failure it answers.
///
/// A request only releases the driver from the failure it was made for, so a
/// wake-up left over from an earlier request never resumes a later failure.
#[derive(Debug, Default)]
pub(crate) struct RetrySignal {
    requested: AtomicU64,
    notify: Notify,
}

impl RetrySignal {
    /// `false` when a retry for `failure` is already pending.
    pub(crate) fn request(&self, failure: u64) -> bool {
        let previous = self.requested.fetch_max(failure, Ordering::AcqRel);
        if previous >= failure {
            return false;
        }
        self.notify.notify_one();
        true
    }

    /// Wait until a retry is requested for `failure`.
    pub(crate) async fn wait(&self, failure: u64) {
        loop {
            let notified = self.notify.notified();
            if self.requested.load(Ordering::Acquire) >= failure {
                return;
            }
            notified.await;
        }
    }
}

/// Cloneable handle for observing and steering one run.
///
/// Taken from a prepared orchestrator; the run itself is driven by
/// [`OptimizationOrchestrator::run`](crate::orchestrator::OptimizationOrchestrator::run).
#[derive(Clone)]
pub struct OrchestratorHandle {
    run_id: Uuid,
    executor: Arc<StepExecutor>,
    retry: Arc<RetrySignal>,
    cancel: CancellationToken,
}

impl OrchestratorHandle {
    pub(crate) fn new(
        run_id: Uuid,
        executor: Arc<StepExecutor>,
        retry: Arc<RetrySignal>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id,
            executor,
            retry,
            cancel,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.executor.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.executor.subscribe()
    }

    /// Ask the driver to run the failed step again.
    ///
    /// Returns `false` when no step is in the failed state or a retry of the
    /// current failure is already pending.
    pub fn retry(&self) -> bool {
        if self.executor.is_empty() || self.cancel.is_cancelled() {
            return false;
        }
        match self.executor.failure() {
            Some((index, failure)) if self.retry.request(failure) => {
                tracing::info!(run_id = %self.run_id, index = index, "Retry requested");
                true
            }
            Some((index, _)) => {
                tracing::debug!(run_id = %self.run_id, index = index, "Retry already pending");
                false
            }
            None => false,
        }
    }

    /// Stop driving the pipeline. A step already in flight is not aborted.
    pub fn abandon(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(run_id = %self.run_id, "Run abandoned");
            self.cancel.cancel();
        }
    }

    pub fn is_abandoned(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_retry_signal_answers_one_failure() {
        let signal = RetrySignal::default();

        assert!(signal.request(1));
        assert!(!signal.request(1));
        signal.wait(1).await;

        // The permit left by the first request must not release a later failure.
        let later = tokio::time::timeout(Duration::from_secs(60), signal.wait(2)).await;
        assert!(later.is_err());

        assert!(signal.request(2));
        signal.wait(2).await;
    }
}
