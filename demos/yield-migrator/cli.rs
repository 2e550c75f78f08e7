use clap::Parser;
use std::path::PathBuf;
use yield_migrator::errors::Result;
use yield_migrator::utils::string_to_address;
use alloy::primitives::Address;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(long, env = "YIELD_CHAIN", default_value = "ethereum", help = "Target blockchain (e.g., ethereum, base, arbitrum)")]
    pub chain: String,

    #[clap(long, env = "YIELD_RPC_URL", help = "RPC URL for on-chain interaction")]
    pub rpc_url: String,

    #[clap(long, env = "YIELD_API_BASE_URL", help = "Base URL of the step definitions service")]
    pub api_base_url: String,

    #[clap(long, env = "YIELD_PRIVATE_KEY", help = "Private key of the wallet whose positions are migrated")]
    pub private_key: Option<String>,

    #[clap(long, help = "Address whose positions are migrated. Defaults to the signer's address")]
    pub user_address: Option<String>,

    #[clap(long, help = "JSON APY feed: chainId -> token address -> protocol -> APY")]
    pub apy_file: PathBuf,

    #[clap(long, help = "JSON list of positions, each an asset plus the protocol it is deposited in")]
    pub positions_file: PathBuf,

    #[clap(long, env = "YIELD_MIN_GAIN_USD", default_value_t = 0.0, help = "Minimum additional yearly USD for a migration to be worth it")]
    pub min_gain_usd: f64,

    #[clap(long, default_value_t = 2, help = "Automatic retries of a failed step before the run is abandoned")]
    pub max_retries: u32,

    #[clap(long, default_value_t = false, help = "Only report opportunities, do not migrate")]
    pub dry_run: bool,
}

impl Args {
    /// Set environment variables from parsed CLI arguments so that
    /// `MigratorConfig::from_env` sees them
    pub fn set_environment_variables(&self) -> Result<()> {
        use std::env;

        env::set_var("YIELD_CHAIN", &self.chain);
        env::set_var("YIELD_RPC_URL", &self.rpc_url);
        env::set_var("YIELD_API_BASE_URL", &self.api_base_url);
        env::set_var("YIELD_MIN_GAIN_USD", self.min_gain_usd.to_string());
        if let Some(ref key) = self.private_key {
            env::set_var("YIELD_PRIVATE_KEY", key);
        }

        tracing::info!(
            chain = %self.chain,
            api_base_url = %self.api_base_url,
            min_gain_usd = self.min_gain_usd,
            has_private_key = self.private_key.is_some(),
            dry_run = self.dry_run,
            "Environment variables set from CLI arguments"
        );

        Ok(())
    }

    pub fn user_address(&self) -> Result<Option<Address>> {
        self.user_address.as_deref().map(string_to_address).transpose()
    }
}

pub fn parse_cli_args() -> Result<Args> {
    let args = Args::parse();
    args.set_environment_variables()?;
    Ok(args)
}
