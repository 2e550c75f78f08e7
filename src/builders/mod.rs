//! Builder patterns for complex object construction.
//!
//! The orchestrator and the HTTP plan resolver each take several
//! collaborators. These builders assemble them step by step and validate
//! that every required piece is present before construction.
//!
//! # Available Builders
//!
//! - **`OrchestratorBuilder`**: Wires a request, resolver, chain client and asset store into an orchestrator
//! - **`PlanResolverBuilder`**: Creates the definitions-service resolver from configuration
//!
//! All build methods consume the builder and return `Result<T>`, failing with
//! `ConfigError::InvalidConfiguration` when a required field is missing.

pub mod orchestrator;
pub mod resolver;

// Re-export builders for convenience
pub use orchestrator::OrchestratorBuilder;
pub use resolver::PlanResolverBuilder;
