//! Builder pattern for OptimizationOrchestrator

use crate::assets::AssetStore;
use crate::chain::ChainClient;
use crate::config::{MigratorConfig, PipelineTiming};
use crate::errors::{ConfigError, Result};
use crate::lock::TransactionLock;
use crate::orchestrator::OptimizationOrchestrator;
use crate::plan::StepPlanResolver;
use crate::yields::OptimizationRequest;
use alloy::primitives::Address;
use std::sync::Arc;

/// Builder for creating OptimizationOrchestrator instances with a fluent API
#[derive(Default)]
pub struct OrchestratorBuilder {
    request: Option<OptimizationRequest>,
    user_address: Option<Address>,
    resolver: Option<Arc<dyn StepPlanResolver>>,
    chain: Option<Arc<dyn ChainClient>>,
    asset_store: Option<Arc<dyn AssetStore>>,
    lock: Option<TransactionLock>,
    timing: PipelineTiming,
}

impl OrchestratorBuilder {
    /// Create a new OrchestratorBuilder with default pacing
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the pipeline timing from the migrator configuration
    pub fn with_config(mut self, config: &MigratorConfig) -> Self {
        self.timing = config.timing.clone();
        self
    }

    pub fn with_timing(mut self, timing: PipelineTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Set the migration to perform
    pub fn with_request(mut self, request: OptimizationRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// Set the wallet whose position is migrated
    pub fn with_user_address(mut self, user_address: Address) -> Self {
        self.user_address = Some(user_address);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn StepPlanResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_asset_store(mut self, asset_store: Arc<dyn AssetStore>) -> Self {
        self.asset_store = Some(asset_store);
        self
    }

    /// Share a transaction lock with other pipelines. A fresh lock is used
    /// when none is given.
    pub fn with_lock(mut self, lock: TransactionLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Build the OptimizationOrchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the request, user address, resolver, chain client
    /// or asset store was not provided
    pub fn build(self) -> Result<OptimizationOrchestrator> {
        let request = self.request.ok_or_else(|| missing("An optimization request"))?;
        let user_address = self.user_address.ok_or_else(|| missing("A user address"))?;
        let resolver = self.resolver.ok_or_else(|| missing("A step plan resolver"))?;
        let chain = self.chain.ok_or_else(|| missing("A chain client"))?;
        let asset_store = self.asset_store.ok_or_else(|| missing("An asset store"))?;

        Ok(OptimizationOrchestrator::new(
            request,
            user_address,
            resolver,
            chain,
            asset_store,
            self.lock.unwrap_or_default(),
            self.timing,
        ))
    }
}

fn missing(what: &str) -> ConfigError {
    ConfigError::InvalidConfiguration {
        message: format!("{} is required to build OptimizationOrchestrator", what),
    }
}
