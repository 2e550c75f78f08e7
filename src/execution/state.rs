//! Execution state and the pipeline state machine derived from it.

use alloy::primitives::TxHash;
use serde::Serialize;
use std::collections::BTreeSet;

/// Where a pipeline stands.
///
/// `Idle -> Executing(i) -> Completed(i) -> Executing(i + 1)`, or
/// `Executing(i) -> Failed(i) -> Executing(i)` on retry, ending in
/// `AllCompleted` once every index has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Executing(usize),
    Completed(usize),
    Failed(usize),
    AllCompleted,
}

/// Mutable state of one pipeline run.
///
/// Invariants: `completed_steps` only holds indices below
/// `current_step_index`, and at most one step executes at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionState {
    pub current_step_index: usize,
    /// Index of the step in flight, if any
    pub executing: Option<usize>,
    pub completed_steps: BTreeSet<usize>,
    pub error: Option<String>,
    /// Index of the step whose failure produced `error`
    pub failed_step: Option<usize>,
    pub last_tx_hash: Option<TxHash>,
    /// Number of failures recorded so far
    pub failures: u64,
}

impl ExecutionState {
    pub fn is_executing(&self) -> bool {
        self.executing.is_some()
    }

    pub fn pipeline_state(&self, total_steps: usize) -> PipelineState {
        if let Some(index) = self.executing {
            return PipelineState::Executing(index);
        }
        if total_steps > 0 && self.current_step_index >= total_steps {
            return PipelineState::AllCompleted;
        }
        if self.error.is_some() {
            return PipelineState::Failed(self.failed_step.unwrap_or(self.current_step_index));
        }
        match self.current_step_index {
            0 => PipelineState::Idle,
            next => PipelineState::Completed(next - 1),
        }
    }

    /// Share of steps completed, in percent. An empty pipeline reports 0.
    pub fn percent_complete(&self, total_steps: usize) -> f64 {
        if total_steps == 0 {
            return 0.0;
        }
        self.completed_steps.len() as f64 / total_steps as f64 * 100.0
    }

    pub fn snapshot(&self, total_steps: usize) -> ProgressSnapshot {
        ProgressSnapshot {
            current_step_index: self.current_step_index,
            total_steps,
            is_executing: self.is_executing(),
            completed_steps: self.completed_steps.clone(),
            error: self.error.clone(),
            percent_complete: self.percent_complete(total_steps),
            last_tx_hash: self.last_tx_hash,
            state: self.pipeline_state(total_steps),
        }
    }
}

/// Read-only view of a pipeline for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub current_step_index: usize,
    pub total_steps: usize,
    pub is_executing: bool,
    pub completed_steps: BTreeSet<usize>,
    pub error: Option<String>,
    pub percent_complete: f64,
    pub last_tx_hash: Option<TxHash>,
    pub state: PipelineState,
}

impl ProgressSnapshot {
    pub fn empty() -> Self {
        ExecutionState::default().snapshot(0)
    }

    pub fn is_finished(&self) -> bool {
        self.state == PipelineState::AllCompleted
    }
}
