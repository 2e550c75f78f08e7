//! Migration opportunity detection.

use crate::assets::Asset;
use crate::yields::BestYieldResult;
use serde::{Deserialize, Serialize};

/// A profitable move of `asset` from `current_protocol` to `better_protocol`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest {
    pub asset: Asset,
    pub current_protocol: String,
    pub current_apy: f64,
    pub better_protocol: String,
    pub better_apy: f64,
    /// Extra USD earned per year at today's balance and rates
    pub additional_yearly_usd: f64,
}

/// Extra yearly USD earned by moving `balance_usd` from `current_apy` to `better_apy`.
///
/// APYs are percentages, so 100 USD moving from 3% to 5% gains 2 USD.
pub fn additional_yearly_usd(balance_usd: f64, current_apy: f64, better_apy: f64) -> f64 {
    balance_usd * (better_apy - current_apy) / 100.0
}

/// Build an [`OptimizationRequest`] when `best` beats the user's current position.
///
/// Returns `None` when the feed has no quote, the best protocol is the one
/// already in use, the best APY is not strictly higher, or the yearly gain
/// is below `min_gain_usd`.
pub fn find_opportunity(
    asset: &Asset,
    current_protocol: &str,
    current_apy: f64,
    best: &BestYieldResult,
    min_gain_usd: f64,
) -> Option<OptimizationRequest> {
    let better_apy = best.best_apy?;
    let better_protocol = best.best_protocol.as_deref()?;

    if better_protocol.eq_ignore_ascii_case(current_protocol) || better_apy <= current_apy {
        return None;
    }

    let gain = additional_yearly_usd(asset.balance_usd, current_apy, better_apy);
    if gain < min_gain_usd {
        tracing::debug!(
            asset = %asset.symbol,
            current_protocol = current_protocol,
            better_protocol = better_protocol,
            additional_yearly_usd = gain,
            min_gain_usd = min_gain_usd,
            "Yield improvement below threshold, skipping"
        );
        return None;
    }

    tracing::info!(
        asset = %asset.symbol,
        chain_id = asset.chain_id,
        current_protocol = current_protocol,
        current_apy = current_apy,
        better_protocol = better_protocol,
        better_apy = better_apy,
        additional_yearly_usd = gain,
        "Found better yield"
    );

    Some(OptimizationRequest {
        asset: asset.clone(),
        current_protocol: current_protocol.to_string(),
        current_apy,
        better_protocol: better_protocol.to_string(),
        better_apy,
        additional_yearly_usd: gain,
    })
}
