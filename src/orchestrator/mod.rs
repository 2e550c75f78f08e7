//! Migration orchestration.
//!
//! An [`OptimizationOrchestrator`] turns one [`OptimizationRequest`] into a
//! pipeline (withdraw steps from the current protocol followed by deposit
//! steps into the better one) and drives it to completion:
//!
//! 1. [`prepare`](OptimizationOrchestrator::prepare) fetches both legs concurrently
//! 2. [`run`](OptimizationOrchestrator::run) holds the [`TransactionLock`] and
//!    executes steps in order, pausing between them
//! 3. on failure the driver waits in `Failed(i)` until [`OrchestratorHandle::retry`]
//!    or [`OrchestratorHandle::abandon`]
//! 4. once every step has run, balances are refreshed in the background and
//!    the completion callback fires after a short delay
//!
//! Steps that already ran are never rolled back.

pub mod handle;
pub mod pipeline;

pub use handle::OrchestratorHandle;
pub use pipeline::compose_pipeline;

use crate::assets::AssetStore;
use crate::chain::ChainClient;
use crate::config::PipelineTiming;
use crate::execution::{ProgressSnapshot, StepContext, StepExecutor, StepOutcome};
use crate::lock::TransactionLock;
use crate::orchestrator::handle::RetrySignal;
use crate::plan::StepPlanResolver;
use crate::yields::OptimizationRequest;
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// How a call to [`OptimizationOrchestrator::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every step ran; `on_complete(true)` was called
    Completed,
    /// The run was abandoned; `on_complete(false)` was called
    Abandoned,
    /// Nothing to run, usually because a plan fetch failed
    Empty,
    /// `run` was already called on this orchestrator
    AlreadyStarted,
    /// Another pipeline holds the transaction lock
    LockHeld,
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub snapshot: ProgressSnapshot,
}

/// Drives one migration from plan fetch to completion callback.
pub struct OptimizationOrchestrator {
    run_id: Uuid,
    request: OptimizationRequest,
    user_address: Address,
    resolver: Arc<dyn StepPlanResolver>,
    chain: Arc<dyn ChainClient>,
    asset_store: Arc<dyn AssetStore>,
    lock: TransactionLock,
    timing: PipelineTiming,
    executor: Arc<StepExecutor>,
    has_started: AtomicBool,
    retry: Arc<RetrySignal>,
    cancel: CancellationToken,
}

impl OptimizationOrchestrator {
    /// Create an orchestrator with an empty pipeline. Call
    /// [`prepare`](Self::prepare) to fetch the steps.
    pub fn new(
        request: OptimizationRequest,
        user_address: Address,
        resolver: Arc<dyn StepPlanResolver>,
        chain: Arc<dyn ChainClient>,
        asset_store: Arc<dyn AssetStore>,
        lock: TransactionLock,
        timing: PipelineTiming,
    ) -> Self {
        let context = StepContext {
            amount: request.asset.balance.clone(),
            user_address,
            token_decimals: request.asset.deposit_decimals(),
            chain_id: request.asset.chain_id,
        };
        let executor = Arc::new(StepExecutor::new(Vec::new(), context, chain.clone(), timing.clone()));

        Self {
            run_id: Uuid::new_v4(),
            request,
            user_address,
            resolver,
            chain,
            asset_store,
            lock,
            timing,
            executor,
            has_started: AtomicBool::new(false),
            retry: Arc::new(RetrySignal::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn request(&self) -> &OptimizationRequest {
        &self.request
    }

    pub fn executor(&self) -> &Arc<StepExecutor> {
        &self.executor
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.executor.snapshot()
    }

    /// Handle over the current pipeline. Take it after `prepare`.
    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle::new(
            self.run_id,
            Arc::clone(&self.executor),
            Arc::clone(&self.retry),
            self.cancel.clone(),
        )
    }

    /// Fetch the withdraw leg for the held asset on the current protocol and
    /// the deposit leg for the underlying asset on the better protocol.
    ///
    /// On a fetch failure the pipeline stays empty and the error is recorded
    /// in the execution state.
    pub async fn prepare(mut self) -> Self {
        let asset = &self.request.asset;
        let chain_id = asset.chain_id;
        tracing::info!(
            run_id = %self.run_id,
            asset = %asset.symbol,
            from = %self.request.current_protocol,
            to = %self.request.better_protocol,
            "Preparing migration pipeline"
        );

        let withdraw = self.resolver.fetch_plan(
            &asset.id,
            asset.contract_address,
            chain_id,
            &self.request.current_protocol,
        );
        let deposit = self.resolver.fetch_plan(
            asset.deposit_asset_id(),
            asset.deposit_contract_address(),
            chain_id,
            &self.request.better_protocol,
        );

        let context = self.executor.context().clone();
        let executor = match futures::future::try_join(withdraw, deposit).await {
            Ok((withdraw_plan, deposit_plan)) => {
                let steps = compose_pipeline(withdraw_plan.withdraw, deposit_plan.deposit);
                if steps.is_empty() {
                    tracing::warn!(run_id = %self.run_id, "Plans contain no steps, nothing to run");
                } else {
                    tracing::info!(run_id = %self.run_id, steps = steps.len(), "Migration pipeline ready");
                }
                StepExecutor::new(steps, context, self.chain.clone(), self.timing.clone())
            }
            Err(e) => {
                tracing::error!(run_id = %self.run_id, error = %e, "Failed to prepare migration pipeline");
                let executor = StepExecutor::new(Vec::new(), context, self.chain.clone(), self.timing.clone());
                executor.record_error(e.to_string());
                executor
            }
        };

        self.executor = Arc::new(executor);
        self
    }

    /// Drive the pipeline to completion.
    ///
    /// Refuses to start an empty pipeline or one that was already started;
    /// `on_complete` is not called in those cases. Otherwise `on_complete`
    /// is called exactly once: with `true` after every step ran and the
    /// completion delay passed, or with `false` when the run is abandoned.
    pub async fn run<F>(&self, on_complete: F) -> RunReport
    where
        F: FnOnce(bool) + Send,
    {
        let started_at = Utc::now();

        if self.executor.is_empty() {
            tracing::warn!(run_id = %self.run_id, "Refusing to start an empty pipeline");
            return self.report(RunOutcome::Empty, started_at);
        }
        if self.has_started.swap(true, Ordering::AcqRel) {
            tracing::warn!(run_id = %self.run_id, "Pipeline already started");
            return self.report(RunOutcome::AlreadyStarted, started_at);
        }
        let Some(_guard) = self.lock.try_acquire() else {
            tracing::warn!(run_id = %self.run_id, "Another transaction pipeline is active");
            self.has_started.store(false, Ordering::Release);
            return self.report(RunOutcome::LockHeld, started_at);
        };

        let span = tracing::info_span!("migration", run_id = %self.run_id);
        tracing::info!(parent: &span, steps = self.executor.len(), "Starting migration pipeline");
        let outcome = self.drive().instrument(span).await;

        match outcome {
            RunOutcome::Completed => {
                tracing::info!(
                    run_id = %self.run_id,
                    additional_yearly_usd = self.request.additional_yearly_usd,
                    "Migration completed"
                );
                on_complete(true);
            }
            _ => {
                tracing::warn!(run_id = %self.run_id, snapshot = ?self.executor.snapshot(), "Migration abandoned");
                on_complete(false);
            }
        }

        self.report(outcome, started_at)
    }

    async fn drive(&self) -> RunOutcome {
        let total = self.executor.len();

        loop {
            let index = self.executor.current_step_index();
            if index >= total {
                break;
            }

            // The step runs on its own task so that abandoning the run leaves
            // an in-flight submission to finish in the background.
            let executor = Arc::clone(&self.executor);
            let step = tokio::spawn(async move { executor.execute_step(index).await });
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return RunOutcome::Abandoned,
                joined = step => joined.unwrap_or_else(|e| {
                    let error = format!("Step task failed: {}", e);
                    self.executor.record_error(error.clone());
                    StepOutcome::Failed { error }
                }),
            };

            match outcome {
                StepOutcome::Completed { .. } => {
                    if self.executor.current_step_index() < total
                        && !self.pause(self.timing.step_delay).await
                    {
                        return RunOutcome::Abandoned;
                    }
                }
                StepOutcome::Failed { .. } | StepOutcome::Rejected { .. } => {
                    if let StepOutcome::Rejected { reason } = &outcome {
                        self.executor.record_error(reason.clone());
                    }
                    let failure = self.executor.failures();
                    tracing::info!(run_id = %self.run_id, index = index, "Waiting for retry");
                    tokio::select! {
                        _ = self.cancel.cancelled() => return RunOutcome::Abandoned,
                        _ = self.retry.wait(failure) => {}
                    }
                }
            }
        }

        self.refresh_assets();
        // Abandoning during the completion delay only skips the wait.
        self.pause(self.timing.completion_delay).await;
        RunOutcome::Completed
    }

    /// Sleep for `delay`; `false` if the run was abandoned meanwhile.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn refresh_assets(&self) {
        let store = Arc::clone(&self.asset_store);
        let user = self.user_address;
        let run_id = self.run_id;
        tokio::spawn(async move {
            if let Err(e) = store.fetch_assets(user, true).await {
                tracing::warn!(run_id = %run_id, error = %e, "Asset refresh failed");
            }
        });
    }

    fn report(&self, outcome: RunOutcome, started_at: DateTime<Utc>) -> RunReport {
        RunReport {
            run_id: self.run_id,
            outcome,
            started_at,
            finished_at: Utc::now(),
            snapshot: self.executor.snapshot(),
        }
    }
}
