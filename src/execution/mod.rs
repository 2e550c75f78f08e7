//! Sequential execution of pipeline steps.
//!
//! A pipeline is an ordered list of [`StepDescriptor`]s. The [`StepExecutor`]
//! runs one step at a time, records which steps completed, keeps the last
//! error for display and lets the caller retry the step that failed:
//!
//! - `state`: execution state, the derived pipeline state machine and progress snapshots
//! - `executor`: the runner enforcing one in-flight step across the pipeline
//! - `confirmation`: bounded, cancellable polling for transaction confirmation

pub mod confirmation;
pub mod executor;
pub mod state;

pub use confirmation::wait_for_confirmation;
pub use executor::{StepExecutor, StepOutcome};
pub use state::{ExecutionState, PipelineState, ProgressSnapshot};

use crate::errors::Result;
use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which leg of a migration a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Withdraw,
    Deposit,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Withdraw => "withdraw",
            Phase::Deposit => "deposit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs every step action receives.
#[derive(Debug, Clone, PartialEq)]
pub struct StepContext {
    /// Amount to move, in human units of the token
    pub amount: String,
    pub user_address: Address,
    pub token_decimals: u8,
    pub chain_id: u64,
}

/// One executable on-chain action.
#[async_trait]
pub trait StepAction: Send + Sync {
    /// Perform the action and return the hash of the submitted transaction.
    async fn run(&self, context: &StepContext) -> Result<TxHash>;
}

/// A step in a pipeline together with its display metadata.
#[derive(Clone)]
pub struct StepDescriptor {
    pub title: String,
    pub description: String,
    pub phase: Phase,
    /// Position of the step within its phase
    pub original_index: usize,
    pub action: Arc<dyn StepAction>,
}

impl StepDescriptor {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        phase: Phase,
        original_index: usize,
        action: Arc<dyn StepAction>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            phase,
            original_index,
            action,
        }
    }
}

impl fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("title", &self.title)
            .field("phase", &self.phase)
            .field("original_index", &self.original_index)
            .finish_non_exhaustive()
    }
}
