//! Error handling for the yield migrator.
//!
//! Errors are grouped by the component that raises them:
//!
//! - **`FetchError`**: step-plan retrieval from the definitions service failed
//! - **`PlanError`**: a plan document was decoded but cannot be turned into calls
//! - **`ExecutionError`**: a pipeline step was rejected, reverted or never confirmed
//! - **`ConfigError`**: environment configuration is missing or out of range
//! - **`UtilityError`**: address parsing, chain lookups and amount conversions
//!
//! # Top-Level Error Type
//!
//! `MigratorError` wraps every domain error plus the errors of the crates the
//! library talks to (reqwest, serde_json, alloy). Library functions return
//! [`Result<T>`] and propagate with `?`.
//!
//! # Errors As Data
//!
//! The orchestrator never lets `FetchError` or `ExecutionError` escape a run.
//! They are rendered to strings and stored in the execution state, where the
//! caller reads them from the progress snapshot and decides whether to retry.

pub mod config;
pub mod execution;
pub mod fetch;
pub mod plan;
pub mod utility;

pub use config::ConfigError;
pub use execution::ExecutionError;
pub use fetch::FetchError;
pub use plan::PlanError;
pub use utility::UtilityError;

/// Main result type for the library
pub type Result<T> = std::result::Result<T, MigratorError>;

/// Top-level error enum for the migrator library.
///
/// Domain errors convert into it automatically, as do the errors of the
/// network, serialization and RPC crates the library depends on.
#[derive(Debug, thiserror::Error)]
pub enum MigratorError {
    /// Retrieving a step plan failed before any execution could begin.
    #[error("Plan fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A decoded plan contains an operation the dispatcher cannot encode.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// A pipeline step failed while executing or confirming.
    #[error("Execution failed: {0}")]
    Execution(#[from] ExecutionError),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error in utility functions or type conversions.
    #[error("Utility error: {0}")]
    Utility(#[from] UtilityError),

    /// Network communication error.
    ///
    /// HTTP request failures, connection timeouts and DNS resolution failures.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// RPC communication error with blockchain nodes.
    ///
    /// This includes errors in RPC requests, response parsing,
    /// connection failures, and blockchain interaction issues.
    #[error("RPC error: {0}")]
    Rpc(#[from] alloy::transports::RpcError<alloy::transports::TransportErrorKind>),

    /// Generic error for cases not covered by specific error types.
    #[error("Generic error: {0}")]
    Other(#[from] anyhow::Error),
}
