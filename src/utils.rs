//! Utility functions and type conversions for chain operations.
//!
//! Helpers shared by the resolver, the dispatcher and the configuration layer:
//!
//! - **Address Handling**: Parsing and validation of Ethereum addresses
//! - **Chain Configuration**: Chain ID mapping in both directions
//! - **Amount Conversions**: Human-readable token amounts to base units
//! - **Token Keys**: Normalisation of token addresses used as map keys

use alloy::primitives::{utils::parse_units, Address, U256};
use std::str::FromStr;
use crate::errors::{Result, UtilityError};

/// Parse a string representation of an Ethereum address.
///
/// Accepts addresses with or without the "0x" prefix and validates
/// the hex format. The address must be exactly 20 bytes (40 hex characters).
///
/// # Errors
///
/// This function will return an error if:
/// - The string contains invalid hex characters
/// - The string is not exactly 40 hex characters (after removing 0x prefix)
pub fn string_to_address(s: &str) -> Result<Address> {
    Address::from_str(s.trim_start_matches("0x"))
        .map_err(|source| UtilityError::AddressParsingFailed {
            input: s.to_string(),
            source: alloy::primitives::AddressError::Hex(source),
        }.into())
}

/// Normalise a token address for use as an APY feed key.
///
/// Feed keys are lowercase hex strings; callers may hold checksummed addresses.
pub fn token_key(token_address: &str) -> String {
    token_address.trim().to_lowercase()
}

/// Convert a human-readable token amount into base units.
///
/// `"100.5"` with 6 decimals becomes `100500000`. Negative amounts and
/// amounts with more fractional digits than `decimals` are rejected.
///
/// # Errors
///
/// Returns `UtilityError::AmountParsingFailed` when the string is not a
/// non-negative decimal number representable with the given decimals.
pub fn parse_token_amount(amount: &str, decimals: u8) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(UtilityError::AmountParsingFailed {
            input: amount.to_string(),
            decimals,
            reason: "amount must be a non-negative decimal".to_string(),
        }.into());
    }

    parse_units(trimmed, decimals)
        .map(|parsed| parsed.get_absolute())
        .map_err(|e| UtilityError::AmountParsingFailed {
            input: amount.to_string(),
            decimals,
            reason: e.to_string(),
        }.into())
}

/// Get the chain ID for a given blockchain name.
///
/// # Errors
///
/// Returns `UtilityError::UnsupportedChain` if the chain name is not recognized.
pub fn chain_id(chain: &str) -> Result<u64> {
    match chain {
        "ethereum" => Ok(1),
        "optimism" => Ok(10),
        "polygon" => Ok(137),
        "base" => Ok(8453),
        "arbitrum" => Ok(42161),
        _ => Err(UtilityError::UnsupportedChain {
            chain: chain.to_string(),
        }.into()),
    }
}

/// Get the chain name for a given chain ID.
///
/// This is the reverse operation of `chain_id()`.
pub fn chain_name(chain_id: u64) -> Result<&'static str> {
    match chain_id {
        1 => Ok("ethereum"),
        10 => Ok("optimism"),
        137 => Ok("polygon"),
        8453 => Ok("base"),
        42161 => Ok("arbitrum"),
        _ => Err(UtilityError::UnsupportedChain {
            chain: chain_id.to_string(),
        }.into()),
    }
}
