//! BDD step definitions for teardown behaviour.

use gatewright::test_support::{ControlCall, ScriptedFailure};
use gatewright::{AuthorizerPart, Checkpoint, CheckpointStore, TeardownCoordinator, TeardownReport};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{TeardownContext, provisioned_checkpoint};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn report(teardown_context: &TeardownContext) -> Result<TeardownReport, StepError> {
    teardown_context
        .report()
        .ok_or_else(|| StepError::Assertion(String::from("teardown did not run")))
}

#[given("a fully provisioned checkpoint")]
fn provisioned(teardown_context: TeardownContext) -> TeardownContext {
    teardown_context.store.put(provisioned_checkpoint());
    teardown_context
}

#[given("an empty teardown checkpoint")]
fn empty(teardown_context: TeardownContext) -> TeardownContext {
    teardown_context
}

#[given("deleting the target fails")]
fn target_deletion_fails(teardown_context: TeardownContext) -> TeardownContext {
    teardown_context.control.fail(ScriptedFailure::DeleteTarget);
    teardown_context
}

#[when("I tear down the gateway")]
fn tear_down(teardown_context: TeardownContext) -> Result<TeardownContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let checkpoint = teardown_context
        .store
        .load()
        .unwrap_or_else(|_| Checkpoint::default());
    let coordinator = TeardownCoordinator::new(
        &teardown_context.control,
        &teardown_context.store,
        "AWSCostEstimationResourceServer",
    );
    let report = runtime.block_on(coordinator.teardown(&checkpoint));
    teardown_context.record(report);
    Ok(teardown_context)
}

#[then("{count:u32} resources are deleted")]
fn resources_deleted(teardown_context: &TeardownContext, count: u32) -> Result<(), StepError> {
    let deleted = report(teardown_context)?.deleted.len();
    if u32::try_from(deleted).is_ok_and(|value| value == count) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} deletions, got {deleted}"
        )))
    }
}

#[then("every deletion succeeds")]
fn no_failures(teardown_context: &TeardownContext) -> Result<(), StepError> {
    let teardown = report(teardown_context)?;
    if teardown.is_clean() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "unexpected failures: {:?}",
            teardown.failures
        )))
    }
}

#[then("{count:u32} deletion fails")]
fn deletions_fail(teardown_context: &TeardownContext, count: u32) -> Result<(), StepError> {
    let failures = report(teardown_context)?.failures.len();
    if u32::try_from(failures).is_ok_and(|value| value == count) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} failures, got {failures}"
        )))
    }
}

#[then("the user pool deletion was still attempted")]
fn pool_deletion_attempted(teardown_context: &TeardownContext) -> Result<(), StepError> {
    let expected = ControlCall::DeleteAuthorizerPart(AuthorizerPart::UserPool {
        user_pool_id: String::from("us-east-1_pool"),
    });
    if teardown_context.control.delete_calls().contains(&expected) {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "user pool deletion should follow a failed target deletion",
        )))
    }
}

#[then("the checkpoint is discarded")]
fn checkpoint_discarded(teardown_context: &TeardownContext) -> Result<(), StepError> {
    let removed = report(teardown_context)?.checkpoint_removed;
    if removed && teardown_context.store.snapshot().is_none() {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "checkpoint should be removed",
        )))
    }
}
