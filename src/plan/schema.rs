//! Wire format of step definitions.
//!
//! The definitions service describes each migration leg as a list of steps
//! drawn from a closed set of operation kinds. Every operation parameter is a
//! [`Binding`]: either a value the client supplies at execution time (the
//! amount, the user's address, …) or a literal fixed by the service.
//!
//! ```json
//! {
//!   "version": 1,
//!   "contractAddress": "0x…",
//!   "chainId": 1,
//!   "protocol": "Aave",
//!   "spender": "0x…",
//!   "withdraw": [
//!     { "title": "Withdraw USDC", "description": "…",
//!       "operation": { "kind": "withdraw", "venue": "aave_v3", "pool": "address:spender",
//!                      "asset": "0x…", "amount": "amount:max", "recipient": "address:user" } }
//!   ],
//!   "deposit": [ … ]
//! }
//! ```

use crate::errors::PlanError;
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schema version this client understands.
pub const PLAN_SCHEMA_VERSION: u32 = 1;

fn default_version() -> u32 {
    PLAN_SCHEMA_VERSION
}

/// Response body of the definitions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    pub contract_address: Address,
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Contract that pulls tokens on deposit, bound by `address:spender`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spender: Option<Address>,
    #[serde(default)]
    pub withdraw: Vec<StepDefinition>,
    #[serde(default)]
    pub deposit: Vec<StepDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub operation: Operation,
}

/// Lending market flavour, which fixes the function signatures used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    AaveV3,
    CompoundV3,
}

fn user_binding() -> Binding {
    Binding::UserAddress
}

/// The closed vocabulary of on-chain operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// ERC-20 `approve(spender, amount)` on `token`
    Approve {
        token: Binding,
        spender: Binding,
        amount: Binding,
    },
    /// Deposit `asset` into a lending `pool`
    Supply {
        venue: Venue,
        pool: Binding,
        asset: Binding,
        amount: Binding,
        #[serde(rename = "onBehalfOf", default = "user_binding")]
        on_behalf_of: Binding,
    },
    /// Withdraw `asset` from a lending `pool`
    Withdraw {
        venue: Venue,
        pool: Binding,
        asset: Binding,
        amount: Binding,
        #[serde(default = "user_binding")]
        recipient: Binding,
    },
    /// Wrap native currency into the wrapped `token`
    Wrap { token: Binding, amount: Binding },
    /// Unwrap the wrapped `token` into native currency
    Unwrap { token: Binding, amount: Binding },
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Approve { .. } => "approve",
            Operation::Supply { .. } => "supply",
            Operation::Withdraw { .. } => "withdraw",
            Operation::Wrap { .. } => "wrap",
            Operation::Unwrap { .. } => "unwrap",
        }
    }
}

/// Source of one operation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Binding {
    /// `"amount"`: the amount being migrated, in base units
    Amount,
    /// `"amount:max"`: `uint256` max, meaning "everything" to lending pools
    MaxAmount,
    /// `"address:user"`
    UserAddress,
    /// `"address:spender"`: the document's `spender`
    SpenderAddress,
    /// `"address:contract"`: the document's `contractAddress`
    ContractAddress,
    /// `"0x…"` with 40 hex digits
    LiteralAddress(Address),
    /// A decimal integer
    LiteralUint(U256),
}

/// Values the client supplies when resolving bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingContext {
    pub amount: U256,
    pub user: Address,
    pub spender: Option<Address>,
    pub contract: Address,
    pub chain_id: u64,
}

impl Binding {
    /// Resolve a binding used as an `address` parameter.
    pub fn resolve_address(&self, ctx: &BindingContext) -> Result<Address, PlanError> {
        match self {
            Binding::UserAddress => Ok(ctx.user),
            Binding::ContractAddress => Ok(ctx.contract),
            Binding::LiteralAddress(address) => Ok(*address),
            Binding::SpenderAddress => ctx.spender.ok_or_else(|| PlanError::MissingSpender {
                binding: self.to_string(),
            }),
            Binding::Amount | Binding::MaxAmount | Binding::LiteralUint(_) => {
                Err(PlanError::BindingTypeMismatch {
                    binding: self.to_string(),
                    expected: "address",
                })
            }
        }
    }

    /// Resolve a binding used as a `uint256` parameter.
    pub fn resolve_uint(&self, ctx: &BindingContext) -> Result<U256, PlanError> {
        match self {
            Binding::Amount => Ok(ctx.amount),
            Binding::MaxAmount => Ok(U256::MAX),
            Binding::LiteralUint(value) => Ok(*value),
            Binding::UserAddress
            | Binding::SpenderAddress
            | Binding::ContractAddress
            | Binding::LiteralAddress(_) => Err(PlanError::BindingTypeMismatch {
                binding: self.to_string(),
                expected: "uint256",
            }),
        }
    }
}

impl FromStr for Binding {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amount" => Ok(Binding::Amount),
            "amount:max" => Ok(Binding::MaxAmount),
            "address:user" => Ok(Binding::UserAddress),
            "address:spender" => Ok(Binding::SpenderAddress),
            "address:contract" => Ok(Binding::ContractAddress),
            literal if literal.starts_with("0x") && literal.len() == 42 => Address::from_str(literal)
                .map(Binding::LiteralAddress)
                .map_err(|_| PlanError::UnknownBinding { binding: s.to_string() }),
            literal if !literal.is_empty() && literal.chars().all(|c| c.is_ascii_digit()) => {
                U256::from_str_radix(literal, 10)
                    .map(Binding::LiteralUint)
                    .map_err(|_| PlanError::UnknownBinding { binding: s.to_string() })
            }
            _ => Err(PlanError::UnknownBinding { binding: s.to_string() }),
        }
    }
}

impl TryFrom<String> for Binding {
    type Error = PlanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Binding> for String {
    fn from(binding: Binding) -> Self {
        binding.to_string()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Amount => f.write_str("amount"),
            Binding::MaxAmount => f.write_str("amount:max"),
            Binding::UserAddress => f.write_str("address:user"),
            Binding::SpenderAddress => f.write_str("address:spender"),
            Binding::ContractAddress => f.write_str("address:contract"),
            Binding::LiteralAddress(address) => write!(f, "{}", address),
            Binding::LiteralUint(value) => write!(f, "{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bindings() {
        assert_eq!("amount".parse::<Binding>().unwrap(), Binding::Amount);
        assert_eq!("amount:max".parse::<Binding>().unwrap(), Binding::MaxAmount);
        assert_eq!("address:user".parse::<Binding>().unwrap(), Binding::UserAddress);
        assert_eq!("address:spender".parse::<Binding>().unwrap(), Binding::SpenderAddress);
        assert_eq!(
            "0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2".parse::<Binding>().unwrap(),
            Binding::LiteralAddress(Address::from_str("0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2").unwrap())
        );
        assert_eq!("42".parse::<Binding>().unwrap(), Binding::LiteralUint(U256::from(42)));
    }

    #[test]
    fn test_reject_unknown_bindings() {
        for raw in ["", "address:admin", "amount * 2", "0x1234", "eval(withdraw)", "-5"] {
            assert!(
                matches!(raw.parse::<Binding>(), Err(PlanError::UnknownBinding { .. })),
                "expected {:?} to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_binding_type_checks() {
        let ctx = BindingContext {
            amount: U256::from(7),
            user: Address::repeat_byte(1),
            spender: None,
            contract: Address::repeat_byte(2),
            chain_id: 1,
        };

        assert_eq!(Binding::Amount.resolve_uint(&ctx).unwrap(), U256::from(7));
        assert_eq!(Binding::MaxAmount.resolve_uint(&ctx).unwrap(), U256::MAX);
        assert_eq!(Binding::ContractAddress.resolve_address(&ctx).unwrap(), Address::repeat_byte(2));
        assert!(matches!(
            Binding::Amount.resolve_address(&ctx),
            Err(PlanError::BindingTypeMismatch { expected: "address", .. })
        ));
        assert!(matches!(
            Binding::UserAddress.resolve_uint(&ctx),
            Err(PlanError::BindingTypeMismatch { expected: "uint256", .. })
        ));
        assert!(matches!(
            Binding::SpenderAddress.resolve_address(&ctx),
            Err(PlanError::MissingSpender { .. })
        ));
    }

    #[test]
    fn test_decode_document() {
        let json = r#"{
            "version": 1,
            "contractAddress": "0x98c23e9d8f34fefb1b7bd6a91b7ff122f4e16f5c",
            "chainId": 1,
            "protocol": "Aave",
            "spender": "0x87870bca3f3fd6335c3f4ce8392d69350b4fa4e2",
            "withdraw": [{
                "title": "Withdraw USDC",
                "operation": {
                    "kind": "withdraw", "venue": "aave_v3", "pool": "address:spender",
                    "asset": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", "amount": "amount:max"
                }
            }],
            "deposit": [
                { "title": "Approve", "description": "Allow the pool to pull USDC",
                  "operation": { "kind": "approve", "token": "address:contract",
                                 "spender": "address:spender", "amount": "amount" } },
                { "title": "Supply",
                  "operation": { "kind": "supply", "venue": "aave_v3", "pool": "address:spender",
                                 "asset": "address:contract", "amount": "amount" } }
            ]
        }"#;

        let document: DefinitionDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.version, PLAN_SCHEMA_VERSION);
        assert_eq!(document.withdraw.len(), 1);
        assert_eq!(document.deposit.len(), 2);
        assert_eq!(document.deposit[1].operation.kind(), "supply");
        match &document.withdraw[0].operation {
            Operation::Withdraw { recipient, amount, venue, .. } => {
                assert_eq!(*recipient, Binding::UserAddress);
                assert_eq!(*amount, Binding::MaxAmount);
                assert_eq!(*venue, Venue::AaveV3);
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_kind_and_binding() {
        let unknown_kind = r#"{ "title": "x", "operation": { "kind": "eval", "source": "drain()" } }"#;
        assert!(serde_json::from_str::<StepDefinition>(unknown_kind).is_err());

        let unknown_binding = r#"{ "title": "x", "operation":
            { "kind": "wrap", "token": "address:contract", "amount": "balanceOf(user)" } }"#;
        assert!(serde_json::from_str::<StepDefinition>(unknown_binding).is_err());
    }
}
