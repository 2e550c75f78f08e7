//! Fixed dispatcher from plan operations to contract calls.
//!
//! Each [`Operation`] kind maps to exactly one known function signature. The
//! dispatcher resolves the operation's bindings and ABI-encodes the call;
//! nothing in a plan document can name a function or carry raw calldata.

use crate::errors::Result;
use crate::plan::schema::{BindingContext, Operation, Venue};
use alloy::{
    primitives::{Address, Bytes, Keccak256, TxKind, U256},
    rpc::types::{TransactionInput, TransactionRequest},
    sol_types::SolValue,
};

const ERC20_APPROVE: &str = "approve(address,uint256)";
const AAVE_SUPPLY: &str = "supply(address,uint256,address,uint16)";
const AAVE_WITHDRAW: &str = "withdraw(address,uint256,address)";
const COMET_SUPPLY: &str = "supply(address,uint256)";
const COMET_WITHDRAW: &str = "withdraw(address,uint256)";
const WETH_DEPOSIT: &str = "deposit()";
const WETH_WITHDRAW: &str = "withdraw(uint256)";

/// Referral code passed to Aave pools.
const AAVE_REFERRAL_CODE: u16 = 0;

/// Prefix ABI-encoded parameters with the selector of `signature`.
pub fn encode_input(signature: &str, encoded_args: Vec<u8>) -> Bytes {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());

    let mut call_data = hasher.finalize()[..4].to_vec();
    call_data.extend(encoded_args);
    Bytes::from(call_data)
}

/// Build the transaction for one operation.
///
/// # Errors
///
/// Returns `PlanError` when a binding cannot be resolved for the parameter
/// it is used for.
pub fn encode_operation(operation: &Operation, ctx: &BindingContext) -> Result<TransactionRequest> {
    let (to, input, value) = match operation {
        Operation::Approve { token, spender, amount } => {
            let args = (spender.resolve_address(ctx)?, amount.resolve_uint(ctx)?).abi_encode_params();
            (token.resolve_address(ctx)?, encode_input(ERC20_APPROVE, args), None)
        }
        Operation::Supply { venue, pool, asset, amount, on_behalf_of } => {
            let asset = asset.resolve_address(ctx)?;
            let amount = amount.resolve_uint(ctx)?;
            let input = match venue {
                Venue::AaveV3 => encode_input(
                    AAVE_SUPPLY,
                    (asset, amount, on_behalf_of.resolve_address(ctx)?, AAVE_REFERRAL_CODE).abi_encode_params(),
                ),
                Venue::CompoundV3 => encode_input(COMET_SUPPLY, (asset, amount).abi_encode_params()),
            };
            (pool.resolve_address(ctx)?, input, None)
        }
        Operation::Withdraw { venue, pool, asset, amount, recipient } => {
            let asset = asset.resolve_address(ctx)?;
            let amount = amount.resolve_uint(ctx)?;
            let input = match venue {
                Venue::AaveV3 => encode_input(
                    AAVE_WITHDRAW,
                    (asset, amount, recipient.resolve_address(ctx)?).abi_encode_params(),
                ),
                Venue::CompoundV3 => encode_input(COMET_WITHDRAW, (asset, amount).abi_encode_params()),
            };
            (pool.resolve_address(ctx)?, input, None)
        }
        Operation::Wrap { token, amount } => (
            token.resolve_address(ctx)?,
            encode_input(WETH_DEPOSIT, Vec::new()),
            Some(amount.resolve_uint(ctx)?),
        ),
        Operation::Unwrap { token, amount } => (
            token.resolve_address(ctx)?,
            encode_input(WETH_WITHDRAW, amount.resolve_uint(ctx)?.abi_encode()),
            None,
        ),
    };

    tracing::debug!(
        kind = operation.kind(),
        to = %to,
        calldata_len = input.len(),
        "Encoded plan operation"
    );

    Ok(call_to(to, input, value, ctx.chain_id))
}

fn call_to(to: Address, input: Bytes, value: Option<U256>, chain_id: u64) -> TransactionRequest {
    TransactionRequest {
        to: Some(TxKind::Call(to)),
        input: TransactionInput::new(input),
        value,
        chain_id: Some(chain_id),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{MigratorError, PlanError};
    use crate::plan::schema::Binding;

    const POOL: Address = Address::new([0x10; 20]);
    const TOKEN: Address = Address::new([0x20; 20]);
    const USER: Address = Address::new([0x30; 20]);

    fn ctx() -> BindingContext {
        BindingContext {
            amount: U256::from(100_000_000u64),
            user: USER,
            spender: Some(POOL),
            contract: TOKEN,
            chain_id: 1,
        }
    }

    fn selector(call: &TransactionRequest) -> [u8; 4] {
        let input = call.input.input().unwrap();
        input[..4].try_into().unwrap()
    }

    fn target(call: &TransactionRequest) -> Address {
        match call.to {
            Some(TxKind::Call(address)) => address,
            other => panic!("unexpected target {:?}", other),
        }
    }

    #[test]
    fn test_approve() {
        let operation = Operation::Approve {
            token: Binding::ContractAddress,
            spender: Binding::SpenderAddress,
            amount: Binding::Amount,
        };
        let call = encode_operation(&operation, &ctx()).unwrap();

        assert_eq!(target(&call), TOKEN);
        assert_eq!(selector(&call), [0x09, 0x5e, 0xa7, 0xb3]);
        let input = call.input.input().unwrap();
        assert_eq!(input.len(), 4 + 64);
        assert_eq!(&input[4 + 12..4 + 32], POOL.as_slice());
        assert_eq!(U256::from_be_slice(&input[36..68]), U256::from(100_000_000u64));
        assert_eq!(call.value, None);
    }

    #[test]
    fn test_aave_supply_and_withdraw() {
        let supply = Operation::Supply {
            venue: Venue::AaveV3,
            pool: Binding::SpenderAddress,
            asset: Binding::ContractAddress,
            amount: Binding::Amount,
            on_behalf_of: Binding::UserAddress,
        };
        let call = encode_operation(&supply, &ctx()).unwrap();
        assert_eq!(target(&call), POOL);
        assert_eq!(selector(&call), [0x61, 0x7b, 0xa0, 0x37]);
        assert_eq!(call.input.input().unwrap().len(), 4 + 4 * 32);

        let withdraw = Operation::Withdraw {
            venue: Venue::AaveV3,
            pool: Binding::SpenderAddress,
            asset: Binding::ContractAddress,
            amount: Binding::MaxAmount,
            recipient: Binding::UserAddress,
        };
        let call = encode_operation(&withdraw, &ctx()).unwrap();
        assert_eq!(selector(&call), [0x69, 0x32, 0x8d, 0xec]);
        let input = call.input.input().unwrap();
        assert_eq!(U256::from_be_slice(&input[36..68]), U256::MAX);
        assert_eq!(&input[68 + 12..100], USER.as_slice());
    }

    #[test]
    fn test_comet_calls_take_two_arguments() {
        let supply = Operation::Supply {
            venue: Venue::CompoundV3,
            pool: Binding::SpenderAddress,
            asset: Binding::ContractAddress,
            amount: Binding::Amount,
            on_behalf_of: Binding::UserAddress,
        };
        let call = encode_operation(&supply, &ctx()).unwrap();
        assert_eq!(selector(&call), [0xf2, 0xb9, 0xfd, 0xb8]);
        assert_eq!(call.input.input().unwrap().len(), 4 + 64);

        let withdraw = Operation::Withdraw {
            venue: Venue::CompoundV3,
            pool: Binding::SpenderAddress,
            asset: Binding::ContractAddress,
            amount: Binding::Amount,
            recipient: Binding::UserAddress,
        };
        let call = encode_operation(&withdraw, &ctx()).unwrap();
        assert_eq!(selector(&call), [0xf3, 0xfe, 0xf3, 0xa3]);
    }

    #[test]
    fn test_wrap_sends_value() {
        let wrap = Operation::Wrap {
            token: Binding::ContractAddress,
            amount: Binding::Amount,
        };
        let call = encode_operation(&wrap, &ctx()).unwrap();
        assert_eq!(selector(&call), [0xd0, 0xe3, 0x0d, 0xb0]);
        assert_eq!(call.input.input().unwrap().len(), 4);
        assert_eq!(call.value, Some(U256::from(100_000_000u64)));

        let unwrap = Operation::Unwrap {
            token: Binding::ContractAddress,
            amount: Binding::LiteralUint(U256::from(5)),
        };
        let call = encode_operation(&unwrap, &ctx()).unwrap();
        assert_eq!(selector(&call), [0x2e, 0x1a, 0x7d, 0x4d]);
        assert_eq!(U256::from_be_slice(&call.input.input().unwrap()[4..36]), U256::from(5));
    }

    #[test]
    fn test_mistyped_binding_is_rejected() {
        let operation = Operation::Approve {
            token: Binding::Amount,
            spender: Binding::SpenderAddress,
            amount: Binding::Amount,
        };
        let result = encode_operation(&operation, &ctx());
        assert!(matches!(
            result,
            Err(MigratorError::Plan(PlanError::BindingTypeMismatch { expected: "address", .. }))
        ));
    }
}
