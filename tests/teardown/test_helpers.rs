//! Shared fixtures for teardown BDD scenarios.

use std::sync::{Arc, Mutex, PoisonError};

use gatewright::test_support::{MemoryCheckpointStore, ScriptedControlPlane};
use gatewright::{Checkpoint, CognitoRecord, TeardownReport};
use rstest::fixture;

#[derive(Clone, Debug)]
pub struct TeardownContext {
    pub control: ScriptedControlPlane,
    pub store: MemoryCheckpointStore,
    pub report: Arc<Mutex<Option<TeardownReport>>>,
}

impl TeardownContext {
    pub fn record(&self, report: TeardownReport) {
        *self.report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);
    }

    pub fn report(&self) -> Option<TeardownReport> {
        self.report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[fixture]
pub fn teardown_context() -> TeardownContext {
    TeardownContext {
        control: ScriptedControlPlane::new(),
        store: MemoryCheckpointStore::new(),
        report: Arc::default(),
    }
}

pub fn provisioned_checkpoint() -> Checkpoint {
    Checkpoint {
        cognito: Some(CognitoRecord {
            client_id: String::from("client-1"),
            client_secret: String::from("secret"),
            token_endpoint: String::from(
                "https://agentcore-1.auth.us-east-1.amazoncognito.com/oauth2/token",
            ),
            scope: String::from("AWSCostEstimationResourceServer/invoke"),
            user_pool_id: String::from("us-east-1_pool"),
            domain_prefix: Some(String::from("agentcore-1")),
            resource_server_id: Some(String::from("AWSCostEstimationResourceServer")),
        }),
        gateway_id: Some(String::from("gw-1")),
        gateway_url: Some(String::from("https://gw-1.example/mcp")),
        target_id: Some(String::from("tgt-1")),
        region: Some(String::from("us-east-1")),
        ..Checkpoint::default()
    }
}
