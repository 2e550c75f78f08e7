//! Best-yield resolution across lending protocols.
//!
//! An APY feed reports, per chain and per token, the annual yield each
//! lending protocol currently pays. [`best_yield`] reduces that to the single
//! best protocol for one token; [`opportunity`] turns the answer into a
//! migration request when it beats the protocol the user is in today.

pub mod opportunity;

pub use opportunity::{additional_yearly_usd, find_opportunity, OptimizationRequest};

use crate::errors::Result;
use crate::utils::token_key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::Path;

/// Protocol names that are always compared first.
pub const AAVE: &str = "Aave";
pub const COMPOUND: &str = "Compound";

/// One protocol's quoted APY for a (chain, token) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldQuote {
    pub protocol: String,
    pub apy: f64,
}

/// Protocol name to APY, in protocol-name order.
pub type ProtocolApys = BTreeMap<String, f64>;

/// APY feed snapshot: `chain_id -> lowercased token address -> protocol -> apy`.
///
/// Chain ids arrive as JSON object keys (`"1"`, `"8453"`) and are parsed as
/// integers on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApyMap(BTreeMap<u64, BTreeMap<String, ProtocolApys>>);

impl Deref for ApyMap {
    type Target = BTreeMap<u64, BTreeMap<String, ProtocolApys>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ApyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a feed snapshot from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a feed snapshot from a JSON file on disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read APY feed {}: {}", path.as_ref().display(), e))?;
        Self::from_json(&contents)
    }

    /// Record a quote, normalising the token key.
    pub fn insert(&mut self, chain_id: u64, token_address: &str, protocol: &str, apy: f64) {
        self.0
            .entry(chain_id)
            .or_default()
            .entry(token_key(token_address))
            .or_default()
            .insert(protocol.to_string(), apy);
    }

    /// All quotes for a (chain, token) pair, in protocol-name order.
    pub fn quotes(&self, chain_id: u64, token_address: &str) -> Vec<YieldQuote> {
        self.protocols(chain_id, token_address)
            .map(|protocols| {
                protocols
                    .iter()
                    .map(|(protocol, apy)| YieldQuote {
                        protocol: protocol.clone(),
                        apy: *apy,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn protocols(&self, chain_id: u64, token_address: &str) -> Option<&ProtocolApys> {
        self.0.get(&chain_id)?.get(&token_key(token_address))
    }
}

/// The best protocol for a token together with the two headline quotes.
///
/// `best_apy` is `None` exactly when the feed has no usable quote for the pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestYieldResult {
    pub best_apy: Option<f64>,
    pub best_protocol: Option<String>,
    pub aave_apy: Option<f64>,
    pub compound_apy: Option<f64>,
}

/// Find the highest-yielding protocol for `token_address` on `chain_id`.
///
/// Aave and Compound are compared first; Aave keeps ties between the two.
/// Every other protocol then replaces the current best only when its APY is
/// strictly greater, so earlier entries win ties. Non-finite quotes are
/// treated as missing. A chain or token absent from the feed yields an
/// all-`None` result.
pub fn best_yield(apy_map: &ApyMap, chain_id: u64, token_address: &str) -> BestYieldResult {
    let Some(protocols) = apy_map.protocols(chain_id, token_address) else {
        return BestYieldResult::default();
    };

    let finite = |name: &str| protocols.get(name).copied().filter(|apy| apy.is_finite());
    let aave_apy = finite(AAVE);
    let compound_apy = finite(COMPOUND);

    let mut best: Option<(f64, &str)> = match (aave_apy, compound_apy) {
        (Some(aave), Some(compound)) if compound > aave => Some((compound, COMPOUND)),
        (Some(aave), _) => Some((aave, AAVE)),
        (None, Some(compound)) => Some((compound, COMPOUND)),
        (None, None) => None,
    };

    for (protocol, apy) in protocols {
        if protocol == AAVE || protocol == COMPOUND || !apy.is_finite() {
            continue;
        }
        if best.map_or(true, |(best_apy, _)| *apy > best_apy) {
            best = Some((*apy, protocol.as_str()));
        }
    }

    tracing::trace!(
        chain_id = chain_id,
        token = %token_key(token_address),
        quote_count = protocols.len(),
        best_protocol = ?best.map(|(_, protocol)| protocol),
        "Resolved best yield"
    );

    BestYieldResult {
        best_apy: best.map(|(apy, _)| apy),
        best_protocol: best.map(|(_, protocol)| protocol.to_string()),
        aave_apy,
        compound_apy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

    fn map_with(quotes: &[(&str, f64)]) -> ApyMap {
        let mut map = ApyMap::new();
        for (protocol, apy) in quotes {
            map.insert(1, USDC, protocol, *apy);
        }
        map
    }

    #[test]
    fn test_compound_beats_aave() {
        let map = map_with(&[(AAVE, 5.0), (COMPOUND, 7.0)]);
        let result = best_yield(&map, 1, USDC);

        assert_eq!(result.best_apy, Some(7.0));
        assert_eq!(result.best_protocol.as_deref(), Some(COMPOUND));
        assert_eq!(result.aave_apy, Some(5.0));
        assert_eq!(result.compound_apy, Some(7.0));
    }

    #[test]
    fn test_aave_keeps_tie_with_compound() {
        let map = map_with(&[(AAVE, 4.0), (COMPOUND, 4.0)]);
        let result = best_yield(&map, 1, USDC);
        assert_eq!(result.best_protocol.as_deref(), Some(AAVE));
    }

    #[test]
    fn test_single_protocol_is_best() {
        for protocol in [AAVE, COMPOUND, "Spark"] {
            let map = map_with(&[(protocol, 3.25)]);
            let result = best_yield(&map, 1, USDC);
            assert_eq!(result.best_apy, Some(3.25));
            assert_eq!(result.best_protocol.as_deref(), Some(protocol));
        }
    }

    #[test]
    fn test_other_protocol_must_be_strictly_greater() {
        let map = map_with(&[(AAVE, 5.0), ("Morpho", 5.0), ("Spark", 6.0), ("Euler", 6.0)]);
        let result = best_yield(&map, 1, USDC);

        // Euler sorts before Spark and wins the tie at 6.0
        assert_eq!(result.best_apy, Some(6.0));
        assert_eq!(result.best_protocol.as_deref(), Some("Euler"));
        assert_eq!(result.compound_apy, None);
    }

    #[test]
    fn test_result_is_true_maximum() {
        let map = map_with(&[(AAVE, 2.0), (COMPOUND, 3.0), ("Fluid", 9.5), ("Morpho", 8.0)]);
        let result = best_yield(&map, 1, USDC);
        let max = map
            .quotes(1, USDC)
            .iter()
            .map(|q| q.apy)
            .fold(f64::MIN, f64::max);
        assert_eq!(result.best_apy, Some(max));
        assert_eq!(result.best_protocol.as_deref(), Some("Fluid"));
    }

    #[test]
    fn test_missing_chain_or_token_is_all_none() {
        let map = map_with(&[(AAVE, 5.0)]);
        assert_eq!(best_yield(&map, 8453, USDC), BestYieldResult::default());
        assert_eq!(
            best_yield(&map, 1, "0x0000000000000000000000000000000000000001"),
            BestYieldResult::default()
        );
        assert_eq!(best_yield(&ApyMap::new(), 1, USDC), BestYieldResult::default());
    }

    #[test]
    fn test_token_lookup_is_case_insensitive() {
        let map = map_with(&[(COMPOUND, 7.0)]);
        let upper = best_yield(&map, 1, &USDC.to_uppercase().replace("0X", "0x"));
        let lower = best_yield(&map, 1, &USDC.to_lowercase());
        assert_eq!(upper, lower);
        assert_eq!(lower.best_protocol.as_deref(), Some(COMPOUND));
    }

    #[test]
    fn test_best_yield_is_pure() {
        let map = map_with(&[(AAVE, 5.0), (COMPOUND, 7.0), ("Spark", 6.0)]);
        assert_eq!(best_yield(&map, 1, USDC), best_yield(&map, 1, USDC));
    }

    #[test]
    fn test_non_finite_quotes_are_ignored() {
        let map = map_with(&[(AAVE, f64::NAN), ("Spark", 1.5)]);
        let result = best_yield(&map, 1, USDC);
        assert_eq!(result.aave_apy, None);
        assert_eq!(result.best_protocol.as_deref(), Some("Spark"));
    }

    #[test]
    fn test_feed_json_parses_chain_keys() {
        let json = r#"{
            "1": { "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48": { "Aave": 3.0, "Compound": 5.0 } },
            "8453": { "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913": { "Aave": 4.1 } }
        }"#;
        let map = ApyMap::from_json(json).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(best_yield(&map, 1, USDC).best_apy, Some(5.0));
        assert_eq!(
            best_yield(&map, 8453, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").best_protocol.as_deref(),
            Some(AAVE)
        );
    }

    #[test]
    fn test_feed_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"1": {{"{}": {{"Compound": 2.5}}}}}}"#, USDC.to_lowercase()).unwrap();

        let map = ApyMap::from_path(file.path()).unwrap();
        assert_eq!(map.quotes(1, USDC), vec![YieldQuote { protocol: COMPOUND.to_string(), apy: 2.5 }]);

        assert!(ApyMap::from_path("/nonexistent/apy.json").is_err());
    }
}
