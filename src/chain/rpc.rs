//! JSON-RPC backed chain client.

use crate::chain::ChainClient;
use crate::config::MigratorConfig;
use crate::errors::{ConfigError, ExecutionError, Result};
use alloy::{
    network::{EthereumWallet, ReceiptResponse},
    primitives::{Address, TxHash},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;

/// Chain client that signs with a local key and talks to an HTTP RPC node.
pub struct RpcChainClient {
    provider: DynProvider,
    sender: Address,
    chain_id: u64,
}

impl RpcChainClient {
    /// Create a client for `chain_id` that signs every call with `signer`.
    ///
    /// Nonce, gas and fee fields left empty on a call are filled by the provider.
    pub fn new(rpc_url: url::Url, signer: PrivateKeySigner, chain_id: u64) -> Self {
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();

        tracing::debug!(
            sender = %sender,
            chain_id = chain_id,
            chain = crate::utils::chain_name(chain_id).unwrap_or("unknown"),
            "RPC chain client created"
        );

        Self {
            provider,
            sender,
            chain_id,
        }
    }

    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidConfiguration` if no signer is configured.
    pub fn from_config(config: &MigratorConfig) -> Result<Self> {
        let signer = config.signer().cloned().ok_or_else(|| ConfigError::InvalidConfiguration {
            message: "YIELD_PRIVATE_KEY is required to submit transactions".to_string(),
        })?;

        Ok(Self::new(config.rpc_url.clone(), signer, config.chain_id))
    }

    /// Address that signs and pays for submitted calls.
    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn submit(&self, mut call: TransactionRequest) -> Result<TxHash> {
        call.from.get_or_insert(self.sender);
        call.chain_id.get_or_insert(self.chain_id);

        let pending = self.provider.send_transaction(call).await.map_err(|e| {
            tracing::warn!(error = %e, sender = %self.sender, "Transaction submission rejected");
            ExecutionError::SubmissionFailed {
                reason: e.to_string(),
            }
        })?;
        let tx_hash = *pending.tx_hash();

        tracing::info!(
            tx_hash = %tx_hash,
            chain_id = self.chain_id,
            "Transaction submitted"
        );

        Ok(tx_hash)
    }

    async fn is_confirmed(&self, tx_hash: TxHash) -> Result<bool> {
        match self.provider.get_transaction_receipt(tx_hash).await? {
            None => Ok(false),
            Some(receipt) if receipt.status() => {
                tracing::debug!(
                    tx_hash = %tx_hash,
                    block_number = ?receipt.block_number(),
                    gas_used = receipt.gas_used(),
                    "Transaction confirmed"
                );
                Ok(true)
            }
            Some(_) => Err(ExecutionError::TransactionReverted { tx_hash }.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_matches_signer() {
        let signer = PrivateKeySigner::random();
        let expected = signer.address();
        let client = RpcChainClient::new("http://localhost:8545".parse().unwrap(), signer, 1);

        assert_eq!(client.sender(), expected);
        assert_eq!(client.chain_id(), 1);
    }

    #[test]
    fn test_from_config_requires_signer() {
        let mut config = MigratorConfig::for_testing();
        config.signer = None;
        assert!(RpcChainClient::from_config(&config).is_err());

        let config = MigratorConfig::for_testing();
        assert!(RpcChainClient::from_config(&config).is_ok());
    }
}
