//! The step executor.

use crate::chain::ChainClient;
use crate::config::PipelineTiming;
use crate::errors::{ExecutionError, MigratorError, Result};
use crate::execution::confirmation::wait_for_confirmation;
use crate::execution::state::{ExecutionState, PipelineState, ProgressSnapshot};
use crate::execution::{StepContext, StepDescriptor};
use alloy::primitives::TxHash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Result of asking the executor to run one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The step ran and submitted `tx_hash`
    Completed { tx_hash: TxHash },
    /// The step ran and failed; the message is stored in the execution state
    Failed { error: String },
    /// The step was not started and the state is untouched
    Rejected { reason: String },
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, StepOutcome::Completed { .. })
    }
}

enum Attempt {
    Rejected(String),
    Ran(Result<TxHash>),
}

/// Runs the steps of one pipeline, one at a time.
///
/// All state lives behind a mutex that is never held across an await, and
/// every change is published to subscribers as a [`ProgressSnapshot`].
pub struct StepExecutor {
    steps: Vec<StepDescriptor>,
    context: StepContext,
    chain: Arc<dyn ChainClient>,
    timing: PipelineTiming,
    state: Mutex<ExecutionState>,
    progress: watch::Sender<ProgressSnapshot>,
}

impl StepExecutor {
    pub fn new(
        steps: Vec<StepDescriptor>,
        context: StepContext,
        chain: Arc<dyn ChainClient>,
        timing: PipelineTiming,
    ) -> Self {
        let state = ExecutionState::default();
        let (progress, _) = watch::channel(state.snapshot(steps.len()));

        Self {
            steps,
            context,
            chain,
            timing,
            state: Mutex::new(state),
            progress,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn context(&self) -> &StepContext {
        &self.context
    }

    pub fn current_step_index(&self) -> usize {
        self.lock_state().current_step_index
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.lock_state().pipeline_state(self.steps.len())
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock_state().snapshot(self.steps.len())
    }

    /// Receive a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    /// Record an error that did not come from a step, such as a failed plan fetch.
    pub fn record_error(&self, message: impl Into<String>) {
        let mut state = self.lock_state();
        state.error = Some(message.into());
        state.failures += 1;
        self.publish(&state);
    }

    /// Number of failures recorded so far, whether from steps or [`record_error`](Self::record_error).
    pub fn failures(&self) -> u64 {
        self.lock_state().failures
    }

    /// The failed step and the failure count it was recorded at, while the
    /// pipeline is in `Failed`.
    pub fn failure(&self) -> Option<(usize, u64)> {
        let state = self.lock_state();
        match state.pipeline_state(self.steps.len()) {
            PipelineState::Failed(index) => Some((index, state.failures)),
            _ => None,
        }
    }

    /// Run the step at `index`.
    ///
    /// Rejected without touching the state when `index` is out of range, is
    /// not the current step, or any step is already executing. On success the
    /// step is marked completed and the current index moves past it; on
    /// failure the error is recorded and the index stays put so the step can
    /// be retried.
    pub async fn execute_step(&self, index: usize) -> StepOutcome {
        match self.run_step(index, None).await {
            Attempt::Rejected(reason) => StepOutcome::Rejected { reason },
            Attempt::Ran(Ok(tx_hash)) => StepOutcome::Completed { tx_hash },
            Attempt::Ran(Err(e)) => StepOutcome::Failed { error: failure_message(&e) },
        }
    }

    /// Run every remaining step in order, waiting for each transaction to confirm.
    ///
    /// A step only counts as completed once its transaction confirms, so a
    /// revert or timeout leaves the pipeline failed at that step and calling
    /// this again resubmits it.
    pub async fn execute_all_steps(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let index = self.current_step_index();
            if index >= self.steps.len() {
                tracing::info!(total = self.steps.len(), "All steps completed");
                return Ok(());
            }

            match self.run_step(index, Some(cancel)).await {
                Attempt::Ran(Ok(_)) => {}
                Attempt::Ran(Err(e)) => return Err(e),
                Attempt::Rejected(reason) => {
                    return Err(ExecutionError::StepRejected { reason }.into());
                }
            }
        }
    }

    /// Run the current step again. Completed steps are not rolled back.
    pub async fn retry_current_step(&self) -> StepOutcome {
        let index = self.current_step_index();
        tracing::info!(index = index, "Retrying current step");
        self.execute_step(index).await
    }

    /// Run one step, optionally holding it open until its transaction confirms.
    async fn run_step(&self, index: usize, confirm: Option<&CancellationToken>) -> Attempt {
        let step = {
            let mut state = self.lock_state();
            if let Err(reason) = self.check_runnable(&state, index) {
                tracing::debug!(index = index, error = %reason, "Step execution rejected");
                return Attempt::Rejected(reason.to_string());
            }

            state.executing = Some(index);
            state.error = None;
            state.failed_step = None;
            self.publish(&state);
            &self.steps[index]
        };

        tracing::info!(
            index = index,
            title = %step.title,
            phase = %step.phase,
            phase_index = step.original_index,
            "Executing step"
        );

        let guard = ExecutingGuard { executor: self, armed: true };
        let mut result = step.action.run(&self.context).await;
        if let (Some(tx_hash), Some(cancel)) = (result.as_ref().ok().copied(), confirm) {
            self.lock_state().last_tx_hash = Some(tx_hash);
            if let Err(e) = wait_for_confirmation(self.chain.as_ref(), tx_hash, &self.timing, cancel).await {
                result = Err(e);
            }
        }
        guard.disarm();

        let mut state = self.lock_state();
        state.executing = None;
        match &result {
            Ok(tx_hash) => {
                state.last_tx_hash = Some(*tx_hash);
                state.completed_steps.insert(index);
                state.current_step_index = index + 1;
                tracing::info!(
                    index = index,
                    tx_hash = %tx_hash,
                    completed = state.completed_steps.len(),
                    total = self.steps.len(),
                    "Step completed"
                );
            }
            Err(e) => {
                let message = failure_message(e);
                tracing::warn!(index = index, error = %message, "Step failed");
                state.error = Some(message);
                state.failed_step = Some(index);
                state.failures += 1;
            }
        }
        self.publish(&state);
        Attempt::Ran(result)
    }

    fn check_runnable(&self, state: &ExecutionState, index: usize) -> std::result::Result<(), ExecutionError> {
        if index >= self.steps.len() {
            return Err(ExecutionError::StepOutOfRange { index, len: self.steps.len() });
        }
        if state.executing.is_some() {
            return Err(ExecutionError::AlreadyExecuting);
        }
        if index != state.current_step_index {
            return Err(ExecutionError::OutOfOrder {
                index,
                current: state.current_step_index,
            });
        }
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, ExecutionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ExecutionState) {
        self.progress.send_replace(state.snapshot(self.steps.len()));
    }
}

/// Clears the in-flight marker if a step future is dropped before finishing.
struct ExecutingGuard<'a> {
    executor: &'a StepExecutor,
    armed: bool,
}

impl ExecutingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.executor.lock_state();
            state.executing = None;
            self.executor.publish(&state);
        }
    }
}

/// Message shown for a failed step: the execution error itself when there
/// is one, without the top-level prefix.
fn failure_message(error: &MigratorError) -> String {
    match error {
        MigratorError::Execution(e) => e.to_string(),
        other => other.to_string(),
    }
}
