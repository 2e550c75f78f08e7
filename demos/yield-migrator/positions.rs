use serde::Deserialize;
use std::path::Path;
use yield_migrator::assets::Asset;
use yield_migrator::errors::Result;
use yield_migrator::yields::{best_yield, find_opportunity, ApyMap, OptimizationRequest};

/// An asset together with the protocol it currently sits in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(flatten)]
    pub asset: Asset,
    pub protocol: String,
}

pub fn load_positions(path: &Path) -> Result<Vec<Position>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read positions {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Opportunities worth at least `min_gain_usd` a year, best first.
pub fn scan(positions: &[Position], apys: &ApyMap, min_gain_usd: f64) -> Vec<OptimizationRequest> {
    let mut requests: Vec<_> = positions
        .iter()
        .filter_map(|position| {
            let asset = &position.asset;
            let token = asset.deposit_contract_address().to_string();
            let current_apy = apys
                .quotes(asset.chain_id, &token)
                .into_iter()
                .find(|quote| quote.protocol.eq_ignore_ascii_case(&position.protocol))
                .map(|quote| quote.apy);

            let Some(current_apy) = current_apy else {
                tracing::warn!(
                    asset = %asset.symbol,
                    protocol = %position.protocol,
                    "No APY quote for the current protocol, skipping"
                );
                return None;
            };

            let best = best_yield(apys, asset.chain_id, &token);
            find_opportunity(asset, &position.protocol, current_apy, &best, min_gain_usd)
        })
        .collect();

    requests.sort_by(|a, b| b.additional_yearly_usd.total_cmp(&a.additional_yearly_usd));
    requests
}
