//! BDD step definitions for the provisioning workflow.

use gatewright::test_support::ControlCall;
use gatewright::{Checkpoint, ProvisioningStep, StepAction};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{
    ProvisionContext, ProvisionOutcome, failure_kind, run_provision,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn seed_completed_run(provision_context: &ProvisionContext) -> Result<Checkpoint, StepError> {
    run_provision(&provision_context.control, &provision_context.store, false)
        .map_err(|err| StepError::Assertion(format!("seed run failed: {err}")))?;
    provision_context
        .store
        .snapshot()
        .ok_or_else(|| StepError::Assertion(String::from("seed run wrote no checkpoint")))
}

fn success(provision_context: &ProvisionContext) -> Result<gatewright::ProvisionSummary, StepError> {
    match provision_context.outcome() {
        Some(ProvisionOutcome::Success(summary)) => Ok(summary),
        Some(ProvisionOutcome::Failure { message, .. }) => Err(StepError::Assertion(format!(
            "expected success, got failure: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

fn snapshot(provision_context: &ProvisionContext) -> Result<Checkpoint, StepError> {
    provision_context
        .store
        .snapshot()
        .ok_or_else(|| StepError::Assertion(String::from("checkpoint should exist")))
}

#[given("an empty checkpoint")]
fn empty_checkpoint(provision_context: ProvisionContext) -> ProvisionContext {
    provision_context
}

#[given("a completed provisioning run")]
fn completed_run(provision_context: ProvisionContext) -> Result<ProvisionContext, StepError> {
    seed_completed_run(&provision_context)?;
    Ok(provision_context)
}

#[given("a checkpoint holding only the authorizer")]
fn authorizer_only(provision_context: ProvisionContext) -> Result<ProvisionContext, StepError> {
    let seed = super::test_helpers::provision_context();
    let checkpoint = seed_completed_run(&seed)?;
    let cognito = checkpoint
        .cognito
        .ok_or_else(|| StepError::Assertion(String::from("seed run recorded no authorizer")))?;
    provision_context
        .store
        .put(Checkpoint::with_cognito(cognito, "us-east-1"));
    Ok(provision_context)
}

#[given("a checkpoint referencing a deleted gateway")]
fn deleted_gateway(provision_context: ProvisionContext) -> Result<ProvisionContext, StepError> {
    let seed = super::test_helpers::provision_context();
    let mut checkpoint = seed_completed_run(&seed)?;
    checkpoint.target_id = None;
    provision_context.store.put(checkpoint);
    Ok(provision_context)
}

#[given("the target reports \"{status}\"")]
fn target_reports(provision_context: ProvisionContext, status: String) -> ProvisionContext {
    provision_context
        .control
        .push_target_statuses(&[status.as_str()]);
    provision_context
}

#[when("I provision the gateway")]
fn provision(provision_context: ProvisionContext) -> ProvisionContext {
    record_run(&provision_context, false);
    provision_context
}

#[when("I provision the gateway with force")]
fn provision_forced(provision_context: ProvisionContext) -> ProvisionContext {
    record_run(&provision_context, true);
    provision_context
}

fn record_run(provision_context: &ProvisionContext, force: bool) {
    let outcome = match run_provision(&provision_context.control, &provision_context.store, force)
    {
        Ok(summary) => ProvisionOutcome::Success(summary),
        Err(err) => ProvisionOutcome::Failure {
            kind: failure_kind(&err),
            message: err.to_string(),
        },
    };
    provision_context.record(outcome);
}

#[then("provisioning succeeds")]
fn provisioning_succeeds(provision_context: &ProvisionContext) -> Result<(), StepError> {
    success(provision_context).map(|_| ())
}

#[then("{count:u32} steps are created")]
fn steps_created(provision_context: &ProvisionContext, count: u32) -> Result<(), StepError> {
    let created = success(provision_context)?.created().len();
    if u32::try_from(created).is_ok_and(|value| value == count) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} created steps, got {created}"
        )))
    }
}

#[then("the checkpoint records every resource")]
fn records_everything(provision_context: &ProvisionContext) -> Result<(), StepError> {
    if snapshot(provision_context)?.is_complete() {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "checkpoint should record authorizer, gateway and target",
        )))
    }
}

#[then("the control plane saw {count:u32} create calls in total")]
fn total_creates(provision_context: &ProvisionContext, count: u32) -> Result<(), StepError> {
    let creates = provision_context.control.create_count();
    if u32::try_from(creates).is_ok_and(|value| value == count) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} create calls, got {creates}"
        )))
    }
}

#[then("the \"{step}\" step is reused")]
fn step_reused(provision_context: &ProvisionContext, step: String) -> Result<(), StepError> {
    let summary = success(provision_context)?;
    let found = ProvisioningStep::ALL
        .into_iter()
        .find(|candidate| candidate.name() == step)
        .ok_or_else(|| StepError::Assertion(format!("unknown step {step}")))?;
    match summary.action(found) {
        Some(StepAction::Reused) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {step} to be reused, got {other:?}"
        ))),
    }
}

#[then("every deletion happened before the authorizer was recreated")]
fn teardown_first(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let calls = provision_context.control.calls();
    let recreated = calls
        .iter()
        .rposition(|call| *call == ControlCall::CreateAuthorizer)
        .ok_or_else(|| StepError::Assertion(String::from("authorizer was not recreated")))?;
    let last_delete = calls
        .iter()
        .rposition(ControlCall::is_delete)
        .ok_or_else(|| StepError::Assertion(String::from("nothing was deleted")))?;
    if last_delete < recreated {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "deletion at call {last_delete} came after recreation at {recreated}"
        )))
    }
}

#[then("provisioning fails with a \"{kind}\" error")]
fn provisioning_fails(provision_context: &ProvisionContext, kind: String) -> Result<(), StepError> {
    match provision_context.outcome() {
        Some(ProvisionOutcome::Failure { kind: actual, .. }) if actual == kind => Ok(()),
        Some(ProvisionOutcome::Failure { kind: actual, message }) => Err(StepError::Assertion(
            format!("expected {kind} failure, got {actual}: {message}"),
        )),
        Some(ProvisionOutcome::Success(_)) => Err(StepError::Assertion(String::from(
            "expected failure, got success",
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the checkpoint records the gateway but no target")]
fn gateway_without_target(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let checkpoint = snapshot(provision_context)?;
    if checkpoint.gateway().is_some() && checkpoint.target_id().is_none() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "unexpected checkpoint: {checkpoint:?}"
        )))
    }
}
