//! Pipeline step execution and confirmation errors.

use alloy::primitives::TxHash;

/// Errors that can occur while a pipeline step executes
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("{reason}")]
    StepRejected { reason: String },

    #[error("Transaction submission failed: {reason}")]
    SubmissionFailed { reason: String },

    #[error("Transaction {tx_hash} reverted")]
    TransactionReverted { tx_hash: TxHash },

    #[error("Transaction {tx_hash} not confirmed after {timeout_ms}ms")]
    ConfirmationTimeout { tx_hash: TxHash, timeout_ms: u64 },

    #[error("Pipeline run was cancelled")]
    Cancelled,

    #[error("Step index {index} is out of range for a pipeline of {len} steps")]
    StepOutOfRange { index: usize, len: usize },

    #[error("Step {index} cannot run while the pipeline is at step {current}")]
    OutOfOrder { index: usize, current: usize },

    #[error("Another step is already executing")]
    AlreadyExecuting,
}
