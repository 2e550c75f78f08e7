//! Configuration management for the yield migrator.
//!
//! Settings are loaded from `YIELD_`-prefixed environment variables and
//! validated up front so a misconfigured endpoint or key fails before any
//! transaction is attempted.

use crate::errors::{ConfigError, Result};
use alloy::signers::local::PrivateKeySigner;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_STEP_DELAY_MS: u64 = 1_000;
const DEFAULT_COMPLETION_DELAY_MS: u64 = 1_500;
const DEFAULT_CONFIRMATION_POLL_MS: u64 = 1_000;
const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 600_000;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

/// Delays and bounds that pace a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineTiming {
    /// Pause between a successful step and the next one
    pub step_delay: Duration,
    /// Pause between the last step and the completion callback
    pub completion_delay: Duration,
    /// Interval between confirmation checks
    pub confirmation_poll_interval: Duration,
    /// Upper bound on a confirmation wait; `None` waits forever
    pub confirmation_timeout: Option<Duration>,
}

impl Default for PipelineTiming {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(DEFAULT_STEP_DELAY_MS),
            completion_delay: Duration::from_millis(DEFAULT_COMPLETION_DELAY_MS),
            confirmation_poll_interval: Duration::from_millis(DEFAULT_CONFIRMATION_POLL_MS),
            confirmation_timeout: Some(Duration::from_millis(DEFAULT_CONFIRMATION_TIMEOUT_MS)),
        }
    }
}

/// Main configuration structure for the migrator
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Base URL of the step definitions service
    pub api_base_url: url::Url,
    /// RPC endpoint used to submit and confirm transactions
    pub rpc_url: url::Url,
    /// Chain the migrator operates on
    pub chain_id: u64,
    /// Key that signs submitted transactions, if submission is enabled
    pub signer: Option<PrivateKeySigner>,
    /// Timeout for definitions requests in milliseconds
    pub http_timeout_ms: u64,
    /// Minimum yearly USD gain for an opportunity to be reported
    pub min_gain_usd: f64,
    /// Pipeline pacing
    pub timing: PipelineTiming,
}

impl MigratorConfig {
    /// Create a new configuration from environment variables
    ///
    /// # Environment Variables
    ///
    /// ## Required
    /// - `YIELD_API_BASE_URL`: Base URL of the definitions service
    /// - `YIELD_RPC_URL`: RPC URL for on-chain interaction
    ///
    /// ## Optional
    /// - `YIELD_CHAIN`: Target blockchain (default: ethereum)
    /// - `YIELD_PRIVATE_KEY`: Private key for transaction signing
    /// - `YIELD_HTTP_TIMEOUT_MS`: Definitions request timeout (default: 10000)
    /// - `YIELD_MIN_GAIN_USD`: Minimum yearly gain to report (default: 0)
    /// - `YIELD_STEP_DELAY_MS`: Pause between steps (default: 1000)
    /// - `YIELD_COMPLETION_DELAY_MS`: Pause before completion (default: 1500)
    /// - `YIELD_CONFIRMATION_POLL_MS`: Confirmation poll interval (default: 1000)
    /// - `YIELD_CONFIRMATION_TIMEOUT_MS`: Confirmation bound, `0` for none (default: 600000)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - URLs or the private key are malformed
    /// - Numeric values are out of range
    pub fn from_env() -> Result<Self> {
        tracing::info!("Loading migrator configuration from environment");

        let api_base_url = Self::parse_url(
            &Self::required_var("YIELD_API_BASE_URL")?,
            "YIELD_API_BASE_URL",
        )?;
        let rpc_url = Self::parse_url(&Self::required_var("YIELD_RPC_URL")?, "YIELD_RPC_URL")?;

        let chain = env::var("YIELD_CHAIN").unwrap_or_else(|_| "ethereum".to_string());
        let chain_id = crate::utils::chain_id(&chain)?;

        let signer = match env::var("YIELD_PRIVATE_KEY") {
            Ok(key) => {
                tracing::debug!("Loading signing key from environment");
                Some(Self::parse_and_validate_private_key(&key, "YIELD_PRIVATE_KEY")?)
            }
            Err(_) => {
                tracing::debug!("No signing key provided, transaction submission disabled");
                None
            }
        };

        let http_timeout_ms = Self::parse_u64("YIELD_HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?;
        if http_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfiguration {
                message: "YIELD_HTTP_TIMEOUT_MS must be greater than 0".to_string(),
            }.into());
        }

        let min_gain_usd = match env::var("YIELD_MIN_GAIN_USD") {
            Ok(value) => match value.parse::<f64>() {
                Ok(gain) if gain.is_finite() && gain >= 0.0 => gain,
                _ => {
                    return Err(ConfigError::InvalidConfiguration {
                        message: format!("YIELD_MIN_GAIN_USD must be a non-negative number, got: {}", value),
                    }.into());
                }
            },
            Err(_) => 0.0,
        };

        let poll_ms = Self::parse_u64("YIELD_CONFIRMATION_POLL_MS", DEFAULT_CONFIRMATION_POLL_MS)?;
        if poll_ms == 0 {
            return Err(ConfigError::InvalidConfiguration {
                message: "YIELD_CONFIRMATION_POLL_MS must be greater than 0".to_string(),
            }.into());
        }

        let timeout_ms = Self::parse_u64("YIELD_CONFIRMATION_TIMEOUT_MS", DEFAULT_CONFIRMATION_TIMEOUT_MS)?;
        let timing = PipelineTiming {
            step_delay: Duration::from_millis(Self::parse_u64("YIELD_STEP_DELAY_MS", DEFAULT_STEP_DELAY_MS)?),
            completion_delay: Duration::from_millis(Self::parse_u64(
                "YIELD_COMPLETION_DELAY_MS",
                DEFAULT_COMPLETION_DELAY_MS,
            )?),
            confirmation_poll_interval: Duration::from_millis(poll_ms),
            confirmation_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
        };

        if timing.confirmation_timeout.is_none() {
            tracing::warn!("Confirmation timeout disabled, a stuck transaction will stall the pipeline");
        }

        let config = Self {
            api_base_url,
            rpc_url,
            chain_id,
            signer,
            http_timeout_ms,
            min_gain_usd,
            timing,
        };

        tracing::info!(
            chain = chain,
            chain_id = chain_id,
            api_base_url = %config.api_base_url,
            has_signer = config.signer.is_some(),
            step_delay_ms = config.timing.step_delay.as_millis(),
            confirmation_timeout_ms = ?config.timing.confirmation_timeout.map(|t| t.as_millis()),
            "Migrator configuration loaded successfully"
        );

        Ok(config)
    }

    /// Create a configuration for testing purposes with a random signing key
    /// and zero delays.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            api_base_url: url::Url::parse("http://127.0.0.1:1").expect("static url"),
            rpc_url: url::Url::parse("http://127.0.0.1:8545").expect("static url"),
            chain_id: 1,
            signer: Some(PrivateKeySigner::random()),
            http_timeout_ms: 1_000,
            min_gain_usd: 0.0,
            timing: PipelineTiming {
                step_delay: Duration::ZERO,
                completion_delay: Duration::ZERO,
                confirmation_poll_interval: Duration::from_millis(1),
                confirmation_timeout: Some(Duration::from_secs(1)),
            },
        }
    }

    /// Get the signer if configured
    pub fn signer(&self) -> Option<&PrivateKeySigner> {
        self.signer.as_ref()
    }

    fn required_var(name: &'static str) -> Result<String> {
        env::var(name).map_err(|_| {
            tracing::error!(variable = name, "Required environment variable not found");
            ConfigError::MissingVariable { name }.into()
        })
    }

    fn parse_u64(name: &str, default: u64) -> Result<u64> {
        match env::var(name) {
            Ok(value) => value.parse::<u64>().map_err(|_| {
                ConfigError::InvalidConfiguration {
                    message: format!("Invalid {} value: {}. Must be a valid integer", name, value),
                }.into()
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse a URL, requiring HTTPS for anything but a local host
    fn parse_url(value: &str, var_name: &str) -> Result<url::Url> {
        let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidConfiguration {
            message: format!("Invalid {} format: {}: {}", var_name, value, e),
        })?;

        let is_local = matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1"));
        if parsed.scheme() != "https" && !is_local {
            return Err(ConfigError::InvalidConfiguration {
                message: format!("{} must use HTTPS: {}", var_name, value),
            }.into());
        }

        Ok(parsed)
    }

    /// Parse and validate a private key from a string
    fn parse_and_validate_private_key(key_str: &str, var_name: &str) -> Result<PrivateKeySigner> {
        let clean_key = key_str.trim_start_matches("0x");

        if clean_key.len() != 64 {
            return Err(ConfigError::InvalidPrivateKey {
                message: format!("{} must be 64 hex characters (32 bytes)", var_name),
            }.into());
        }

        if !clean_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidPrivateKey {
                message: format!("{} contains invalid hex characters", var_name),
            }.into());
        }

        PrivateKeySigner::from_str(clean_key).map_err(|e| {
            ConfigError::InvalidPrivateKey {
                message: format!("Failed to parse {}: {}", var_name, e),
            }.into()
        })
    }
}
