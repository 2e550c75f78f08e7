pub mod cli;
pub mod positions;

use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use yield_migrator::assets::AssetStore;
use yield_migrator::chain::RpcChainClient;
use yield_migrator::config::MigratorConfig;
use yield_migrator::errors::Result;
use yield_migrator::execution::PipelineState;
use yield_migrator::yields::{ApyMap, OptimizationRequest};
use yield_migrator::{OrchestratorBuilder, OrchestratorHandle, PlanResolverBuilder, RunOutcome, TransactionLock};

/// Asset store that only records refresh requests.
struct LoggingAssetStore;

#[async_trait]
impl AssetStore for LoggingAssetStore {
    async fn fetch_assets(&self, address: Address, silent: bool) -> Result<()> {
        tracing::info!(address = %address, silent = silent, "Balance refresh requested");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("yield_migrator=info".parse().unwrap())
        )
        .compact()
        .with_file(false)
        .with_line_number(false)
        .with_target(false)
        .init();

    let args = cli::parse_cli_args()?;
    let config = MigratorConfig::from_env()?;

    let apys = ApyMap::from_path(&args.apy_file)?;
    let positions = positions::load_positions(&args.positions_file)?;
    let opportunities = positions::scan(&positions, &apys, config.min_gain_usd);

    tracing::info!(
        positions = positions.len(),
        opportunities = opportunities.len(),
        "Yield scan finished"
    );
    for request in &opportunities {
        tracing::info!(
            asset = %request.asset.symbol,
            from = %request.current_protocol,
            current_apy = request.current_apy,
            to = %request.better_protocol,
            better_apy = request.better_apy,
            additional_yearly_usd = request.additional_yearly_usd,
            "Migration opportunity"
        );
    }
    if args.dry_run || opportunities.is_empty() {
        return Ok(());
    }

    let chain = Arc::new(RpcChainClient::from_config(&config)?);
    let user_address = args.user_address()?.unwrap_or_else(|| chain.sender());
    let resolver = Arc::new(
        PlanResolverBuilder::new()
            .with_config(&config)
            .with_chain(chain.clone())
            .build()?,
    );
    let store = Arc::new(LoggingAssetStore);
    let lock = TransactionLock::new();

    for request in opportunities {
        let outcome = migrate(request, user_address, &config, &args, resolver.clone(), chain.clone(), store.clone(), lock.clone()).await?;
        if outcome == RunOutcome::Abandoned {
            tracing::warn!("Stopping after an abandoned migration");
            break;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn migrate(
    request: OptimizationRequest,
    user_address: Address,
    config: &MigratorConfig,
    args: &cli::Args,
    resolver: Arc<dyn yield_migrator::plan::StepPlanResolver>,
    chain: Arc<dyn yield_migrator::chain::ChainClient>,
    store: Arc<dyn AssetStore>,
    lock: TransactionLock,
) -> Result<RunOutcome> {
    let symbol = request.asset.symbol.clone();
    let orchestrator = OrchestratorBuilder::new()
        .with_config(config)
        .with_request(request)
        .with_user_address(user_address)
        .with_resolver(resolver)
        .with_chain(chain)
        .with_asset_store(store)
        .with_lock(lock)
        .build()?
        .prepare()
        .await;

    let handle = orchestrator.handle();
    let supervisor = tokio::spawn(supervise(handle.clone(), args.max_retries));
    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, abandoning the current migration");
                handle.abandon();
            }
        })
    };

    let report = orchestrator
        .run(|success| tracing::info!(asset = %symbol, success = success, "Migration finished"))
        .await;
    supervisor.abort();
    interrupt.abort();

    if let Some(error) = &report.snapshot.error {
        tracing::error!(run_id = %report.run_id, error = %error, "Migration ended with an error");
    }
    tracing::info!(
        run_id = %report.run_id,
        outcome = ?report.outcome,
        completed = report.snapshot.completed_steps.len(),
        total = report.snapshot.total_steps,
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "Run report"
    );
    Ok(report.outcome)
}

/// Log progress and retry failed steps a bounded number of times.
async fn supervise(handle: OrchestratorHandle, max_retries: u32) {
    let mut progress = handle.subscribe();
    let mut retries = 0;

    while progress.changed().await.is_ok() {
        if handle.is_abandoned() {
            return;
        }
        let snapshot = progress.borrow_and_update().clone();
        tracing::info!(
            state = ?snapshot.state,
            percent_complete = snapshot.percent_complete,
            tx_hash = ?snapshot.last_tx_hash,
            "Pipeline progress"
        );

        match snapshot.state {
            PipelineState::Failed(index) if retries < max_retries => {
                retries += 1;
                tracing::warn!(index = index, attempt = retries, error = ?snapshot.error, "Retrying failed step");
                tokio::time::sleep(Duration::from_secs(2)).await;
                handle.retry();
            }
            PipelineState::Failed(index) => {
                tracing::error!(index = index, error = ?snapshot.error, "Giving up on failed step");
                handle.abandon();
                return;
            }
            PipelineState::AllCompleted => return,
            _ => {}
        }
    }
}
