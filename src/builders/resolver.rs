//! Builder pattern for HttpPlanResolver

use crate::chain::ChainClient;
use crate::config::MigratorConfig;
use crate::errors::{ConfigError, Result};
use crate::plan::HttpPlanResolver;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating HttpPlanResolver instances with a fluent API
#[derive(Default)]
pub struct PlanResolverBuilder {
    base_url: Option<url::Url>,
    timeout: Option<Duration>,
    chain: Option<Arc<dyn ChainClient>>,
}

impl PlanResolverBuilder {
    /// Create a new PlanResolverBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the definitions URL and HTTP timeout from the migrator configuration
    pub fn with_config(mut self, config: &MigratorConfig) -> Self {
        self.base_url = Some(config.api_base_url.clone());
        self.timeout = Some(Duration::from_millis(config.http_timeout_ms));
        self
    }

    pub fn with_base_url(mut self, base_url: url::Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the chain client resolved steps submit through
    pub fn with_chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Build the HttpPlanResolver
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL or chain client was provided, or if the
    /// HTTP client cannot be constructed
    pub fn build(self) -> Result<HttpPlanResolver> {
        let base_url = self.base_url.ok_or_else(|| ConfigError::InvalidConfiguration {
            message: "A definitions base URL is required to build HttpPlanResolver".to_string(),
        })?;
        let chain = self.chain.ok_or_else(|| ConfigError::InvalidConfiguration {
            message: "A chain client is required to build HttpPlanResolver".to_string(),
        })?;

        let mut http_client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http_client = http_client.timeout(timeout);
        }

        Ok(HttpPlanResolver::new(http_client.build()?, base_url, chain))
    }
}
