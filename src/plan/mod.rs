//! Step plans: what to execute to leave one protocol and enter another.
//!
//! A plan is fetched per `(asset, protocol)` pair from the definitions service
//! and decoded into a closed vocabulary of operations:
//!
//! - `schema`: the versioned wire format and typed parameter bindings
//! - `dispatcher`: one fixed call encoder per operation kind
//! - `http`: the [`StepPlanResolver`] backed by the definitions service

pub mod dispatcher;
pub mod http;
pub mod schema;

pub use dispatcher::{encode_input, encode_operation};
pub use http::HttpPlanResolver;
pub use schema::{Binding, BindingContext, DefinitionDocument, Operation, StepDefinition, Venue, PLAN_SCHEMA_VERSION};

use crate::chain::ChainClient;
use crate::errors::{ExecutionError, Result};
use crate::FetchResult;
use crate::execution::{StepAction, StepContext};
use crate::utils::parse_token_amount;
use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Source of step plans for a given asset and protocol.
#[async_trait]
pub trait StepPlanResolver: Send + Sync {
    /// Fetch the withdraw and deposit steps for `asset_id` on `protocol`.
    ///
    /// Errors are returned as data; nothing is executed while fetching.
    async fn fetch_plan(
        &self,
        asset_id: &str,
        contract_address: Address,
        chain_id: u64,
        protocol: &str,
    ) -> FetchResult<StepPlan>;
}

/// Both legs of a plan, in execution order.
#[derive(Debug, Clone, Default)]
pub struct StepPlan {
    pub withdraw: Vec<ExecutableStep>,
    pub deposit: Vec<ExecutableStep>,
}

impl StepPlan {
    pub fn len(&self) -> usize {
        self.withdraw.len() + self.deposit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.withdraw.is_empty() && self.deposit.is_empty()
    }
}

/// A decoded plan step bound to the chain it submits to.
#[derive(Clone)]
pub struct ExecutableStep {
    pub title: String,
    pub description: String,
    pub operation: Operation,
    pub contract_address: Address,
    pub spender: Option<Address>,
    pub chain_id: u64,
    chain: Arc<dyn ChainClient>,
}

impl ExecutableStep {
    pub fn new(
        definition: StepDefinition,
        contract_address: Address,
        spender: Option<Address>,
        chain_id: u64,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        Self {
            title: definition.title,
            description: definition.description,
            operation: definition.operation,
            contract_address,
            spender,
            chain_id,
            chain,
        }
    }

    pub fn bindings(&self, context: &StepContext) -> Result<BindingContext> {
        Ok(BindingContext {
            amount: parse_token_amount(&context.amount, context.token_decimals)?,
            user: context.user_address,
            spender: self.spender,
            contract: self.contract_address,
            chain_id: self.chain_id,
        })
    }
}

#[async_trait]
impl StepAction for ExecutableStep {
    async fn run(&self, context: &StepContext) -> Result<TxHash> {
        if context.chain_id != self.chain_id {
            return Err(ExecutionError::StepRejected {
                reason: format!(
                    "Step targets chain {} but the wallet is on chain {}",
                    self.chain_id, context.chain_id
                ),
            }
            .into());
        }

        let call = encode_operation(&self.operation, &self.bindings(context)?)?;
        self.chain.submit(call).await
    }
}

impl fmt::Debug for ExecutableStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableStep")
            .field("title", &self.title)
            .field("operation", &self.operation)
            .field("contract_address", &self.contract_address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MigratorError;
    use crate::execution::testing::{context, FakeChain};
    use alloy::primitives::{TxKind, U256};

    fn approve_step(chain: Arc<FakeChain>, chain_id: u64) -> ExecutableStep {
        ExecutableStep::new(
            StepDefinition {
                title: "Approve USDC".to_string(),
                description: String::new(),
                operation: Operation::Approve {
                    token: Binding::ContractAddress,
                    spender: Binding::SpenderAddress,
                    amount: Binding::Amount,
                },
            },
            Address::repeat_byte(0x20),
            Some(Address::repeat_byte(0x10)),
            chain_id,
            chain,
        )
    }

    #[tokio::test]
    async fn test_run_submits_encoded_call() {
        let chain = FakeChain::confirming_after(1);
        let step = approve_step(chain.clone(), 1);

        let tx_hash = step.run(&context()).await.unwrap();
        assert_eq!(tx_hash, TxHash::repeat_byte(1));

        let submitted = chain.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].to, Some(TxKind::Call(Address::repeat_byte(0x20))));
        let input = submitted[0].input.input().unwrap();
        // "100" with 6 decimals
        assert_eq!(U256::from_be_slice(&input[36..68]), U256::from(100_000_000u64));
    }

    #[tokio::test]
    async fn test_run_rejects_wrong_chain() {
        let chain = FakeChain::confirming_after(1);
        let step = approve_step(chain.clone(), 10);

        let result = step.run(&context()).await;
        assert!(matches!(
            result,
            Err(MigratorError::Execution(ExecutionError::StepRejected { .. }))
        ));
        assert!(chain.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_rejects_bad_amount() {
        let chain = FakeChain::confirming_after(1);
        let step = approve_step(chain.clone(), 1);
        let mut ctx = context();
        ctx.amount = "1.0000001".to_string();

        assert!(matches!(step.run(&ctx).await, Err(MigratorError::Utility(_))));
        assert!(chain.submitted.lock().unwrap().is_empty());
    }
}
