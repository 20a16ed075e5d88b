//! BDD scenarios for the provisioning workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ProvisionContext, provision_context};

#[scenario(
    path = "tests/features/provision.feature",
    name = "Provision everything from an empty checkpoint"
)]
fn scenario_provision_from_empty(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Rerunning a completed provision makes no remote calls"
)]
fn scenario_rerun_is_idempotent(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Resume from a checkpoint holding only the authorizer"
)]
fn scenario_resume_from_authorizer(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Force recreation tears down before creating"
)]
fn scenario_force_recreation(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "A failed target aborts and keeps earlier progress"
)]
fn scenario_failed_target(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "A stale gateway surfaces the remote error"
)]
fn scenario_stale_gateway(provision_context: ProvisionContext) {
    let _ = provision_context;
}
