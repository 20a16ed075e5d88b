//! Shared fixtures for provisioning BDD scenarios.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use gatewright::test_support::{
    MemoryCheckpointStore, ScriptedControlError, ScriptedControlPlane, StaticProbe,
};
use gatewright::{Poller, ProvisionError, ProvisionSettings, ProvisionSummary, Provisioner};
use rstest::fixture;
use tokio::runtime::Runtime;

pub const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:estimator";

#[derive(Clone, Debug)]
pub enum ProvisionOutcome {
    Success(ProvisionSummary),
    Failure { kind: &'static str, message: String },
}

#[derive(Clone, Debug)]
pub struct ProvisionContext {
    pub control: ScriptedControlPlane,
    pub store: MemoryCheckpointStore,
    pub outcome: Arc<Mutex<Option<ProvisionOutcome>>>,
}

impl ProvisionContext {
    pub fn record(&self, outcome: ProvisionOutcome) {
        *self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outcome);
    }

    pub fn outcome(&self) -> Option<ProvisionOutcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[fixture]
pub fn provision_context() -> ProvisionContext {
    ProvisionContext {
        control: ScriptedControlPlane::new(),
        store: MemoryCheckpointStore::new(),
        outcome: Arc::default(),
    }
}

pub fn settings() -> ProvisionSettings {
    ProvisionSettings {
        region: String::from("us-east-1"),
        gateway_role_arn: String::from("arn:aws:iam::123456789012:role/gateway"),
        gateway_name: String::from("AWSCostEstimationGateway"),
        target_name: String::from("AWSCostEstimationLambdaTarget"),
        resource_server_id: String::from("AWSCostEstimationResourceServer"),
        stack_name: String::from("AWS-Cost-Estimator-Agent"),
        function_output_key: String::from("AgentCoreGatewayFunctionArn"),
        function_arn_override: Some(String::from(FUNCTION_ARN)),
        discovery_wait: Poller::new(Duration::from_secs(1), Duration::from_millis(10)),
        readiness_wait: Poller::new(Duration::from_secs(1), Duration::from_millis(10)),
    }
}

pub fn run_provision(
    control: &ScriptedControlPlane,
    store: &MemoryCheckpointStore,
    force: bool,
) -> Result<ProvisionSummary, ProvisionError<ScriptedControlError>> {
    let runtime =
        Runtime::new().unwrap_or_else(|err| panic!("tokio runtime should start: {err}"));
    let provisioner = Provisioner::new(
        control.clone(),
        store.clone(),
        StaticProbe::ready(),
        settings(),
    );
    runtime.block_on(async move { provisioner.provision(force).await })
}

pub const fn failure_kind(err: &ProvisionError<ScriptedControlError>) -> &'static str {
    match err {
        ProvisionError::Checkpoint(_) => "checkpoint",
        ProvisionError::FunctionArnMissing { .. } | ProvisionError::FunctionLookup(_) => {
            "function"
        }
        ProvisionError::Authorizer(_) => "authorizer",
        ProvisionError::Gateway(_) => "gateway",
        ProvisionError::Target(_) => "target",
        ProvisionError::Readiness(_) => "readiness",
    }
}
