//! Confirmation polling for submitted transactions.

use crate::chain::ChainClient;
use crate::config::PipelineTiming;
use crate::errors::{ExecutionError, MigratorError, Result};
use alloy::primitives::TxHash;
use tokio_util::sync::CancellationToken;

/// Poll `chain` until `tx_hash` is confirmed.
///
/// Checks run every `timing.confirmation_poll_interval`. The wait ends with
/// `ConfirmationTimeout` once `timing.confirmation_timeout` elapses (never,
/// when unset) and with `Cancelled` as soon as `cancel` fires. Transient RPC
/// failures are logged and polled through; a reverted transaction ends the
/// wait immediately.
pub async fn wait_for_confirmation(
    chain: &dyn ChainClient,
    tx_hash: TxHash,
    timing: &PipelineTiming,
    cancel: &CancellationToken,
) -> Result<()> {
    let interval = timing.confirmation_poll_interval;

    let poll = async {
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            match chain.is_confirmed(tx_hash).await {
                Ok(true) => {
                    tracing::debug!(tx_hash = %tx_hash, attempts = attempts, "Transaction confirmation observed");
                    return Ok(());
                }
                Ok(false) => {}
                Err(MigratorError::Execution(e)) => return Err(MigratorError::from(e)),
                Err(e) => {
                    tracing::warn!(
                        tx_hash = %tx_hash,
                        attempts = attempts,
                        error = %e,
                        "Confirmation check failed, will poll again"
                    );
                }
            }
            tokio::time::sleep(interval).await;
        }
    };

    let bounded = async {
        match timing.confirmation_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, poll).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!(
                        tx_hash = %tx_hash,
                        timeout_ms = timeout.as_millis() as u64,
                        "Transaction confirmation timed out"
                    );
                    Err(ExecutionError::ConfirmationTimeout {
                        tx_hash,
                        timeout_ms: timeout.as_millis() as u64,
                    }.into())
                }
            },
            None => poll.await,
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!(tx_hash = %tx_hash, "Confirmation wait cancelled");
            Err(ExecutionError::Cancelled.into())
        }
        result = bounded => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::testing::FakeChain;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn timing(timeout: Option<Duration>) -> PipelineTiming {
        PipelineTiming {
            step_delay: Duration::ZERO,
            completion_delay: Duration::ZERO,
            confirmation_poll_interval: Duration::from_secs(1),
            confirmation_timeout: timeout,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_confirmed() {
        let chain = FakeChain::confirming_after(3);
        let result = wait_for_confirmation(
            chain.as_ref(),
            TxHash::repeat_byte(1),
            &timing(Some(Duration::from_secs(60))),
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(chain.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_confirmed() {
        let chain = FakeChain::never_confirming();
        let result = wait_for_confirmation(
            chain.as_ref(),
            TxHash::repeat_byte(1),
            &timing(Some(Duration::from_secs(5))),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(MigratorError::Execution(ExecutionError::ConfirmationTimeout { timeout_ms: 5_000, .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_wait_honours_cancellation() {
        let chain = FakeChain::never_confirming();
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            canceller.cancel();
        });

        let result =
            wait_for_confirmation(chain.as_ref(), TxHash::repeat_byte(1), &timing(None), &cancel).await;

        assert!(matches!(result, Err(MigratorError::Execution(ExecutionError::Cancelled))));
        assert!(chain.polls.load(Ordering::SeqCst) > 1_000);
    }
}
