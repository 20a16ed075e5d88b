//! Core library for the gatewright provisioning tool.
//!
//! The crate provisions an OAuth machine-to-machine authorizer, an MCP
//! gateway guarded by it, and a Lambda target implementing the cost
//! estimation tool. Progress is checkpointed to a local JSON file after every
//! step so runs are idempotent and resumable; `force` tears everything down
//! first. Remote calls go through the [`ControlPlane`] seam, with an AWS
//! implementation in [`aws`].

pub mod aws;
pub mod checkpoint;
pub mod config;
pub mod config_store;
pub mod control;
pub mod discovery;
pub mod gateway_client;
pub mod poller;
pub mod provision;
pub mod stream;
pub mod teardown;
#[cfg(test)]
pub mod test_helpers;
pub mod test_support;
pub mod token;

pub use aws::{AwsControlPlane, AwsError, Endpoints};
pub use checkpoint::{Checkpoint, CognitoRecord};
pub use config::{ConfigError, ProvisionerConfig};
pub use config_store::{CheckpointStore, ConfigStore, ConfigStoreError, DEFAULT_CHECKPOINT_FILE};
pub use control::{
    AuthorizerPart, AuthorizerRequest, ControlPlane, GatewayHandle, GatewayRequest, TargetRequest,
};
pub use discovery::{DiscoveryProbe, EndpointProbe, discovery_url};
pub use gateway_client::{GatewayClient, GatewayClientError, ToolDescriptor, find_tool};
pub use poller::{PollError, PollOutcome, PollReport, PollStatus, Poller};
pub use provision::{
    ProvisionError, ProvisionSettings, ProvisionSummary, Provisioner, ProvisioningStep,
    StepAction, StepReport,
};
pub use stream::{DeltaReconciler, StreamEvent, reconcile_stream};
pub use teardown::{TeardownCoordinator, TeardownFailure, TeardownReport, TeardownResource};
pub use token::{AccessToken, ClientCredentials, CognitoTokenClient, TokenCache, TokenError, TokenSource};
