//! Blockchain access for the step pipeline.
//!
//! The pipeline only needs two capabilities from the chain: submit a call and
//! learn whether a submitted transaction is confirmed. [`ChainClient`] is that
//! seam; [`RpcChainClient`] implements it over an alloy HTTP provider that
//! signs with a local key.

pub mod rpc;

pub use rpc::RpcChainClient;

use crate::errors::Result;
use alloy::primitives::TxHash;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

/// Submission and confirmation of transactions on one chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Sign and broadcast `call`, returning its hash once accepted by the node.
    async fn submit(&self, call: TransactionRequest) -> Result<TxHash>;

    /// Whether `tx_hash` has been included successfully.
    ///
    /// `Ok(false)` means not yet mined. A mined but reverted transaction is an
    /// error, since waiting longer cannot change the outcome.
    async fn is_confirmed(&self, tx_hash: TxHash) -> Result<bool>;
}
