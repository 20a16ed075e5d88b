//! BDD scenarios for the teardown coordinator.

use rstest_bdd_macros::scenario;

use super::test_helpers::{TeardownContext, teardown_context};

#[scenario(
    path = "tests/features/teardown.feature",
    name = "Tear down every recorded resource"
)]
fn scenario_full_teardown(teardown_context: TeardownContext) {
    let _ = teardown_context;
}

#[scenario(
    path = "tests/features/teardown.feature",
    name = "Teardown continues past a failed target deletion"
)]
fn scenario_teardown_resilience(teardown_context: TeardownContext) {
    let _ = teardown_context;
}

#[scenario(
    path = "tests/features/teardown.feature",
    name = "Tearing down an empty checkpoint deletes nothing"
)]
fn scenario_empty_teardown(teardown_context: TeardownContext) {
    let _ = teardown_context;
}
