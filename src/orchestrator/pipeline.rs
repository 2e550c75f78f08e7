//! Composition of withdraw and deposit legs into one pipeline.

use crate::execution::{Phase, StepAction, StepDescriptor};
use crate::plan::ExecutableStep;
use std::sync::Arc;

/// Concatenate `withdraw ++ deposit`, tagging each step with its phase and
/// its index within that phase.
pub fn compose_pipeline(withdraw: Vec<ExecutableStep>, deposit: Vec<ExecutableStep>) -> Vec<StepDescriptor> {
    let tag = |phase: Phase| {
        move |(index, step): (usize, ExecutableStep)| {
            StepDescriptor::new(
                step.title.clone(),
                step.description.clone(),
                phase,
                index,
                Arc::new(step) as Arc<dyn StepAction>,
            )
        }
    };

    withdraw
        .into_iter()
        .enumerate()
        .map(tag(Phase::Withdraw))
        .chain(deposit.into_iter().enumerate().map(tag(Phase::Deposit)))
        .collect()
}
