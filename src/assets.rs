//! Asset model and the asset-store collaborator.
//!
//! The migrator does not fetch balances itself. It receives an [`Asset`]
//! describing the user's position and, once a migration finishes, asks an
//! [`AssetStore`] to re-sync balances so the caller's view is up to date.

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// The token a receipt token (aToken, cToken, …) redeems into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderlyingAsset {
    /// Definitions-service identifier of the underlying token
    pub id: String,
    pub contract_address: Address,
    pub decimals: u8,
}

/// A user's position in one token on one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Definitions-service identifier
    pub id: String,
    pub symbol: String,
    pub chain_id: u64,
    pub contract_address: Address,
    pub decimals: u8,
    /// Full balance in human units, e.g. `"100.25"`
    pub balance: String,
    /// Balance valued in USD
    pub balance_usd: f64,
    /// Set when this asset is a protocol receipt token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying: Option<UnderlyingAsset>,
}

impl Asset {
    /// Identifier used to fetch deposit steps for the redeemed token.
    ///
    /// Falls back to this asset when it is not a receipt token.
    pub fn deposit_asset_id(&self) -> &str {
        self.underlying.as_ref().map(|u| u.id.as_str()).unwrap_or(&self.id)
    }

    /// Contract address of the token that gets redeposited.
    pub fn deposit_contract_address(&self) -> Address {
        self.underlying
            .as_ref()
            .map(|u| u.contract_address)
            .unwrap_or(self.contract_address)
    }

    /// Decimals of the token that gets redeposited.
    pub fn deposit_decimals(&self) -> u8 {
        self.underlying.as_ref().map(|u| u.decimals).unwrap_or(self.decimals)
    }
}

/// Balance store refreshed when a migration completes.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Re-sync balances for `address`.
    ///
    /// `silent` asks the store not to surface loading indicators.
    async fn fetch_assets(&self, address: Address, silent: bool) -> Result<()>;
}
