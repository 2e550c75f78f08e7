//! Yield Migrator Library
//!
//! Finds the lending protocol paying the best yield for a token and moves a
//! position there: the funds are withdrawn from the current protocol and
//! deposited into the better one as an ordered pipeline of on-chain steps.
//!
//! # Architecture Overview
//!
//! The library is organized into several key modules:
//!
//! - **`yields`**: Best-yield resolution over an APY feed and opportunity detection
//! - **`plan`**: Versioned step plans fetched from the definitions service and a fixed call dispatcher
//! - **`execution`**: Sequential step execution, progress state and confirmation polling
//! - **`orchestrator`**: Composes withdraw and deposit legs and drives a run to completion
//! - **`lock`**: Ownership token preventing overlapping transaction pipelines
//! - **`chain`**: Transaction submission and confirmation over JSON-RPC
//! - **`assets`**: User positions and the balance store refreshed after a run
//! - **`config`**: Environment configuration and pipeline pacing
//! - **`builders`**: Builder patterns for complex object construction
//! - **`errors`**: Error types for every component
//! - **`utils`**: Address parsing, chain lookups and amount conversions
//!
//! # Core Concepts
//!
//! - **Step**: One atomic on-chain action such as an approval, a supply or a withdrawal
//! - **Pipeline**: Withdraw steps followed by deposit steps for one migration
//! - **Step Plan**: A closed vocabulary of operations with typed parameter
//!   bindings; remote definitions are data and are never executed as code
//!
//! # Failure Model
//!
//! Fetch and execution failures are recorded in the pipeline's progress
//! snapshot rather than returned across the orchestrator boundary. A failed
//! step halts the pipeline until it is retried; steps that already ran are
//! never rolled back.

pub mod assets;
pub mod builders;
pub mod chain;
pub mod config;
pub mod errors;
pub mod execution;
pub mod lock;
pub mod orchestrator;
pub mod plan;
pub mod utils;
pub mod yields;

// Re-export the main Result type and error enum for convenience
pub use errors::{MigratorError, Result};

// Re-export builder patterns for convenience
pub use builders::{OrchestratorBuilder, PlanResolverBuilder};

pub use lock::{TransactionGuard, TransactionLock};
pub use orchestrator::{OptimizationOrchestrator, OrchestratorHandle, RunOutcome, RunReport};
pub use yields::{best_yield, find_opportunity, BestYieldResult, OptimizationRequest};

// Module-specific result types for better ergonomics
pub type FetchResult<T> = std::result::Result<T, errors::FetchError>;
