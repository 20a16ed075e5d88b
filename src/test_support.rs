//! Test support utilities shared across unit and integration tests.
//!
//! The doubles share their state through `Arc<Mutex<_>>`, so clones handed
//! to a [`Provisioner`](crate::provision::Provisioner) stay observable from
//! the test that created them.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::aws::token_endpoint;
use crate::checkpoint::{Checkpoint, CognitoRecord};
use crate::config_store::{CheckpointStore, ConfigStoreError, DEFAULT_CHECKPOINT_FILE};
use crate::control::{
    AuthorizerPart, AuthorizerRequest, ControlFuture, ControlPlane, GatewayHandle, GatewayRequest,
    STATUS_READY, TargetRequest,
};
use crate::discovery::{EndpointProbe, ProbeFuture};
use crate::poller::PollStatus;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Remote call recorded by [`ScriptedControlPlane`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlCall {
    /// `create_authorizer`.
    CreateAuthorizer,
    /// `create_gateway` with the allowed client.
    CreateGateway {
        /// Client trusted by the gateway's authorizer.
        allowed_client_id: String,
    },
    /// `gateway_status`.
    GatewayStatus {
        /// Gateway queried.
        gateway_id: String,
    },
    /// `create_target`.
    CreateTarget {
        /// Gateway receiving the target.
        gateway_id: String,
        /// Function bound to the target.
        lambda_arn: String,
    },
    /// `target_status`.
    TargetStatus {
        /// Target queried.
        target_id: String,
    },
    /// `delete_target`.
    DeleteTarget {
        /// Target removed.
        target_id: String,
    },
    /// `delete_gateway`.
    DeleteGateway {
        /// Gateway removed.
        gateway_id: String,
    },
    /// `delete_authorizer_part`.
    DeleteAuthorizerPart(AuthorizerPart),
    /// `stack_output`.
    StackOutput {
        /// Stack queried.
        stack_name: String,
    },
}

impl ControlCall {
    /// Returns `true` for calls that create a remote resource.
    #[must_use]
    pub const fn is_create(&self) -> bool {
        matches!(
            self,
            Self::CreateAuthorizer | Self::CreateGateway { .. } | Self::CreateTarget { .. }
        )
    }

    /// Returns `true` for calls that delete a remote resource.
    #[must_use]
    pub const fn is_delete(&self) -> bool {
        matches!(
            self,
            Self::DeleteTarget { .. } | Self::DeleteGateway { .. } | Self::DeleteAuthorizerPart(_)
        )
    }
}

/// Operations that can be scripted to fail.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum ScriptedFailure {
    /// `create_authorizer` fails.
    CreateAuthorizer,
    /// `create_gateway` fails.
    CreateGateway,
    /// `create_target` fails.
    CreateTarget,
    /// `delete_target` fails.
    DeleteTarget,
    /// `delete_gateway` fails.
    DeleteGateway,
    /// Every `delete_authorizer_part` call fails.
    DeleteAuthorizerPart,
    /// `stack_output` fails.
    StackOutput,
}

/// Error returned by [`ScriptedControlPlane`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted {operation} failure: {message}")]
pub struct ScriptedControlError {
    /// Operation that failed.
    pub operation: String,
    /// Failure description.
    pub message: String,
}

impl ScriptedControlError {
    fn new(operation: &str, message: impl Into<String>) -> Self {
        Self {
            operation: operation.to_owned(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
struct ControlState {
    calls: Vec<ControlCall>,
    failures: BTreeSet<ScriptedFailure>,
    gateway_statuses: VecDeque<String>,
    target_statuses: VecDeque<String>,
    live_gateways: BTreeSet<String>,
    stack_output: Option<String>,
    next_id: u32,
}

impl ControlState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id = self.next_id.saturating_add(1);
        format!("{prefix}-{}", self.next_id)
    }

    fn check(&self, failure: ScriptedFailure, operation: &str) -> Result<(), ScriptedControlError> {
        if self.failures.contains(&failure) {
            return Err(ScriptedControlError::new(operation, "simulated failure"));
        }
        Ok(())
    }
}

/// In-memory control plane with scripted statuses and failures.
///
/// Status queries pop from per-resource queues and report `READY` once a
/// queue is empty. Targets can only be created on gateways the double knows
/// about, which mirrors how a stale checkpoint surfaces remotely.
#[derive(Clone, Debug, Default)]
pub struct ScriptedControlPlane {
    state: Arc<Mutex<ControlState>>,
}

impl ScriptedControlPlane {
    /// Creates a double with no scripted behaviour.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `operation` fail from now on.
    pub fn fail(&self, operation: ScriptedFailure) {
        lock(&self.state).failures.insert(operation);
    }

    /// Queues gateway statuses returned before `READY`.
    pub fn push_gateway_statuses(&self, statuses: &[&str]) {
        lock(&self.state)
            .gateway_statuses
            .extend(statuses.iter().map(|status| (*status).to_owned()));
    }

    /// Queues target statuses returned before `READY`.
    pub fn push_target_statuses(&self, statuses: &[&str]) {
        lock(&self.state)
            .target_statuses
            .extend(statuses.iter().map(|status| (*status).to_owned()));
    }

    /// Marks a gateway as existing remotely.
    pub fn register_gateway(&self, gateway_id: &str) {
        lock(&self.state)
            .live_gateways
            .insert(gateway_id.to_owned());
    }

    /// Sets the value returned for any stack output lookup.
    pub fn set_stack_output(&self, value: &str) {
        lock(&self.state).stack_output = Some(value.to_owned());
    }

    /// Snapshot of every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ControlCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of resource-creating calls made so far.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.calls().iter().filter(|call| call.is_create()).count()
    }

    /// Deletion calls made so far, in order.
    #[must_use]
    pub fn delete_calls(&self) -> Vec<ControlCall> {
        self.calls()
            .into_iter()
            .filter(ControlCall::is_delete)
            .collect()
    }

    fn record(&self, call: ControlCall) -> MutexGuard<'_, ControlState> {
        let mut state = lock(&self.state);
        state.calls.push(call);
        state
    }

    fn scripted_authorizer(
        &self,
        request: &AuthorizerRequest,
    ) -> Result<CognitoRecord, ScriptedControlError> {
        let mut state = self.record(ControlCall::CreateAuthorizer);
        state.check(ScriptedFailure::CreateAuthorizer, "create_authorizer")?;
        let user_pool_id = state.next_id("pool");
        let client_id = state.next_id("client");
        let domain_prefix = format!("agentcore-{}", state.next_id("domain"));
        Ok(CognitoRecord {
            client_id,
            client_secret: String::from("scripted-secret"),
            token_endpoint: token_endpoint(&domain_prefix, &request.region),
            scope: format!("{}/invoke", request.resource_server_id),
            user_pool_id,
            domain_prefix: Some(domain_prefix),
            resource_server_id: Some(request.resource_server_id.clone()),
        })
    }

    fn scripted_gateway(
        &self,
        request: &GatewayRequest,
    ) -> Result<GatewayHandle, ScriptedControlError> {
        let mut state = self.record(ControlCall::CreateGateway {
            allowed_client_id: request.allowed_client_id.clone(),
        });
        state.check(ScriptedFailure::CreateGateway, "create_gateway")?;
        let id = state.next_id("gw");
        state.live_gateways.insert(id.clone());
        Ok(GatewayHandle {
            url: format!("https://{id}.gateway.example/mcp"),
            id,
        })
    }

    fn scripted_target(&self, request: &TargetRequest) -> Result<String, ScriptedControlError> {
        let mut state = self.record(ControlCall::CreateTarget {
            gateway_id: request.gateway_id.clone(),
            lambda_arn: request.lambda_arn.clone(),
        });
        state.check(ScriptedFailure::CreateTarget, "create_target")?;
        if !state.live_gateways.contains(&request.gateway_id) {
            return Err(ScriptedControlError::new(
                "create_target",
                format!(
                    "ResourceNotFoundException: gateway {} not found",
                    request.gateway_id
                ),
            ));
        }
        Ok(state.next_id("tgt"))
    }
}

impl ControlPlane for ScriptedControlPlane {
    type Error = ScriptedControlError;

    fn create_authorizer<'a>(
        &'a self,
        request: &'a AuthorizerRequest,
    ) -> ControlFuture<'a, CognitoRecord, Self::Error> {
        let result = self.scripted_authorizer(request);
        Box::pin(async move { result })
    }

    fn create_gateway<'a>(
        &'a self,
        request: &'a GatewayRequest,
    ) -> ControlFuture<'a, GatewayHandle, Self::Error> {
        let result = self.scripted_gateway(request);
        Box::pin(async move { result })
    }

    fn gateway_status<'a>(&'a self, gateway_id: &'a str) -> ControlFuture<'a, String, Self::Error> {
        let mut state = self.record(ControlCall::GatewayStatus {
            gateway_id: gateway_id.to_owned(),
        });
        let status = state
            .gateway_statuses
            .pop_front()
            .unwrap_or_else(|| STATUS_READY.to_owned());
        drop(state);
        Box::pin(async move { Ok(status) })
    }

    fn create_target<'a>(
        &'a self,
        request: &'a TargetRequest,
    ) -> ControlFuture<'a, String, Self::Error> {
        let result = self.scripted_target(request);
        Box::pin(async move { result })
    }

    fn target_status<'a>(
        &'a self,
        _gateway_id: &'a str,
        target_id: &'a str,
    ) -> ControlFuture<'a, String, Self::Error> {
        let mut state = self.record(ControlCall::TargetStatus {
            target_id: target_id.to_owned(),
        });
        let status = state
            .target_statuses
            .pop_front()
            .unwrap_or_else(|| STATUS_READY.to_owned());
        drop(state);
        Box::pin(async move { Ok(status) })
    }

    fn delete_target<'a>(
        &'a self,
        _gateway_id: &'a str,
        target_id: &'a str,
    ) -> ControlFuture<'a, (), Self::Error> {
        let state = self.record(ControlCall::DeleteTarget {
            target_id: target_id.to_owned(),
        });
        let result = state.check(ScriptedFailure::DeleteTarget, "delete_target");
        drop(state);
        Box::pin(async move { result })
    }

    fn delete_gateway<'a>(&'a self, gateway_id: &'a str) -> ControlFuture<'a, (), Self::Error> {
        let mut state = self.record(ControlCall::DeleteGateway {
            gateway_id: gateway_id.to_owned(),
        });
        let result = state.check(ScriptedFailure::DeleteGateway, "delete_gateway");
        if result.is_ok() {
            state.live_gateways.remove(gateway_id);
        }
        drop(state);
        Box::pin(async move { result })
    }

    fn delete_authorizer_part<'a>(
        &'a self,
        part: &'a AuthorizerPart,
    ) -> ControlFuture<'a, (), Self::Error> {
        let state = self.record(ControlCall::DeleteAuthorizerPart(part.clone()));
        let result = state.check(ScriptedFailure::DeleteAuthorizerPart, "delete_authorizer_part");
        drop(state);
        Box::pin(async move { result })
    }

    fn stack_output<'a>(
        &'a self,
        stack_name: &'a str,
        _output_key: &'a str,
    ) -> ControlFuture<'a, Option<String>, Self::Error> {
        let state = self.record(ControlCall::StackOutput {
            stack_name: stack_name.to_owned(),
        });
        let result = state
            .check(ScriptedFailure::StackOutput, "stack_output")
            .map(|()| state.stack_output.clone());
        drop(state);
        Box::pin(async move { result })
    }
}

#[derive(Debug, Default)]
struct StoreState {
    checkpoint: Option<Checkpoint>,
    saves: usize,
    fail_discard: bool,
}

/// Checkpoint store kept in memory.
#[derive(Clone, Debug)]
pub struct MemoryCheckpointStore {
    path: Utf8PathBuf,
    state: Arc<Mutex<StoreState>>,
}

impl Default for MemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: Utf8PathBuf::from(DEFAULT_CHECKPOINT_FILE),
            state: Arc::default(),
        }
    }

    /// Creates a store that already holds `checkpoint`.
    #[must_use]
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        let store = Self::new();
        store.put(checkpoint);
        store
    }

    /// Replaces the stored checkpoint.
    pub fn put(&self, checkpoint: Checkpoint) {
        lock(&self.state).checkpoint = Some(checkpoint);
    }

    /// Makes `discard` fail from now on.
    pub fn fail_discard(&self) {
        lock(&self.state).fail_discard = true;
    }

    /// Current stored checkpoint, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Checkpoint> {
        lock(&self.state).checkpoint.clone()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn saves(&self) -> usize {
        lock(&self.state).saves
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn load(&self) -> Result<Checkpoint, ConfigStoreError> {
        lock(&self.state)
            .checkpoint
            .clone()
            .ok_or_else(|| ConfigStoreError::NotFound {
                path: self.path.clone(),
            })
    }

    fn save(&self, partial: Checkpoint) -> Result<Utf8PathBuf, ConfigStoreError> {
        let mut state = lock(&self.state);
        state
            .checkpoint
            .get_or_insert_with(Checkpoint::default)
            .merge(partial);
        state.saves = state.saves.saturating_add(1);
        Ok(self.path.clone())
    }

    fn discard(&self) -> Result<bool, ConfigStoreError> {
        let mut state = lock(&self.state);
        if state.fail_discard {
            return Err(ConfigStoreError::Io {
                path: self.path.clone(),
                message: String::from("simulated discard failure"),
            });
        }
        Ok(state.checkpoint.take().is_some())
    }
}

/// Endpoint probe that replays scripted statuses, then a fallback.
#[derive(Clone, Debug)]
pub struct StaticProbe {
    queued: Arc<Mutex<VecDeque<PollStatus>>>,
    fallback: PollStatus,
    probes: Arc<Mutex<usize>>,
}

impl StaticProbe {
    /// Probe that always reports ready.
    #[must_use]
    pub fn ready() -> Self {
        Self::with_fallback(PollStatus::Ready(String::from("discovery document served")))
    }

    /// Probe that never becomes ready.
    #[must_use]
    pub fn pending() -> Self {
        Self::with_fallback(PollStatus::Pending(String::from("not found yet (404)")))
    }

    fn with_fallback(fallback: PollStatus) -> Self {
        Self {
            queued: Arc::default(),
            fallback,
            probes: Arc::default(),
        }
    }

    /// Queues statuses returned before the fallback.
    pub fn push(&self, status: PollStatus) {
        lock(&self.queued).push_back(status);
    }

    /// Number of probes performed.
    #[must_use]
    pub fn probes(&self) -> usize {
        *lock(&self.probes)
    }
}

impl EndpointProbe for StaticProbe {
    fn probe<'a>(&'a self, _url: &'a str) -> ProbeFuture<'a> {
        {
            let mut probes = lock(&self.probes);
            *probes = probes.saturating_add(1);
        }
        let status = lock(&self.queued)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Box::pin(async move { status })
    }
}
