//! Address, chain and amount conversion errors

use thiserror::Error;

/// Errors raised while converting user-supplied strings into chain types
#[derive(Debug, Error)]
pub enum UtilityError {
    #[error("Failed to parse address from string '{input}': {source}")]
    AddressParsingFailed {
        input: String,
        #[source]
        source: alloy::primitives::AddressError,
    },

    #[error("Unsupported chain: {chain}")]
    UnsupportedChain { chain: String },

    #[error("Failed to parse amount '{input}' with {decimals} decimals: {reason}")]
    AmountParsingFailed {
        input: String,
        decimals: u8,
        reason: String,
    },
}
