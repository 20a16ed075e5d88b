//! Exactly-once provisioning of the authorizer, gateway and target.
//!
//! The provisioner walks [`ProvisioningStep`]s in order. A step whose block
//! is already recorded in the checkpoint is reused without any remote call;
//! otherwise the resource is created and its block is persisted before the
//! next step starts. Completed steps are never rolled back, so a failed run
//! resumes from the last persisted block. Only `force` tears everything
//! down first.

mod error;

use camino::Utf8PathBuf;
use tracing::{info, warn};

use crate::checkpoint::{Checkpoint, CognitoRecord};
use crate::config_store::CheckpointStore;
use crate::control::{
    AuthorizerRequest, ControlPlane, GatewayHandle, GatewayRequest, STATUS_FAILED, STATUS_READY,
    TargetRequest,
};
use crate::discovery::{EndpointProbe, discovery_url};
use crate::poller::{PollStatus, Poller};
use crate::teardown::{TeardownCoordinator, TeardownReport};

pub use error::ProvisionError;

/// Validated inputs for a provisioning run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionSettings {
    /// Region every resource is created in.
    pub region: String,
    /// Execution role assumed by the gateway.
    pub gateway_role_arn: String,
    /// Name given to the gateway.
    pub gateway_name: String,
    /// Name given to the Lambda target.
    pub target_name: String,
    /// Resource server identifier carrying the `invoke` scope.
    pub resource_server_id: String,
    /// Stack whose outputs name the function ARN.
    pub stack_name: String,
    /// Output key holding the function ARN.
    pub function_output_key: String,
    /// Function ARN supplied on the command line.
    pub function_arn_override: Option<String>,
    /// Advisory wait for the OIDC discovery document.
    pub discovery_wait: Poller,
    /// Required wait for gateway and target readiness.
    pub readiness_wait: Poller,
}

/// Resources created in order by the provisioner.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProvisioningStep {
    /// OAuth authorizer (user pool, domain, resource server, app client).
    Authorizer,
    /// MCP gateway.
    Gateway,
    /// Lambda target.
    Target,
}

impl ProvisioningStep {
    /// Steps in execution order.
    pub const ALL: [Self; 3] = [Self::Authorizer, Self::Gateway, Self::Target];

    /// Short name used in logs and summaries.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Authorizer => "authorizer",
            Self::Gateway => "gateway",
            Self::Target => "target",
        }
    }

    /// Returns `true` when the checkpoint already records this step.
    #[must_use]
    pub fn is_satisfied(self, checkpoint: &Checkpoint) -> bool {
        match self {
            Self::Authorizer => checkpoint.has_authorizer(),
            Self::Gateway => checkpoint.gateway().is_some(),
            Self::Target => checkpoint.target_id().is_some(),
        }
    }
}

/// What the provisioner did for a step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepAction {
    /// The resource was created in this run.
    Created,
    /// The resource was taken from the checkpoint.
    Reused,
}

/// Action taken for one step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StepReport {
    /// Step concerned.
    pub step: ProvisioningStep,
    /// What happened.
    pub action: StepAction,
}

/// Outcome of a successful provisioning run.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionSummary {
    /// Per-step actions in execution order.
    pub steps: Vec<StepReport>,
    /// Gateway identifier and MCP URL.
    pub gateway: GatewayHandle,
    /// Target identifier.
    pub target_id: String,
    /// App client allowed to call the gateway.
    pub client_id: String,
    /// Location of the checkpoint file.
    pub checkpoint_path: Utf8PathBuf,
    /// Whether the discovery document was served; `None` when not checked.
    pub discovery_ready: Option<bool>,
    /// `true` when the checkpoint was already complete.
    pub already_configured: bool,
    /// Teardown performed before creation, when forcing.
    pub teardown: Option<TeardownReport>,
}

impl ProvisionSummary {
    /// Action recorded for `step`.
    #[must_use]
    pub fn action(&self, step: ProvisioningStep) -> Option<StepAction> {
        self.steps
            .iter()
            .find(|report| report.step == step)
            .map(|report| report.action)
    }

    /// Steps created in this run.
    #[must_use]
    pub fn created(&self) -> Vec<ProvisioningStep> {
        self.steps
            .iter()
            .filter(|report| report.action == StepAction::Created)
            .map(|report| report.step)
            .collect()
    }
}

/// Drives a provisioning run against a control plane and checkpoint store.
#[derive(Debug)]
pub struct Provisioner<C, S, P> {
    control: C,
    store: S,
    probe: P,
    settings: ProvisionSettings,
}

impl<C, S, P> Provisioner<C, S, P>
where
    C: ControlPlane,
    S: CheckpointStore,
    P: EndpointProbe,
{
    /// Creates a provisioner.
    #[must_use]
    pub const fn new(control: C, store: S, probe: P, settings: ProvisionSettings) -> Self {
        Self {
            control,
            store,
            probe,
            settings,
        }
    }

    /// Control plane used by this provisioner.
    #[must_use]
    pub const fn control(&self) -> &C {
        &self.control
    }

    /// Checkpoint store used by this provisioner.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Provisions every missing resource, or all of them when `force` is
    /// set.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the checkpoint cannot be used, the
    /// function ARN cannot be resolved, a remote creation fails, or a
    /// required readiness wait fails or times out. Resources created before
    /// the failure stay recorded in the checkpoint.
    pub async fn provision(
        &self,
        force: bool,
    ) -> Result<ProvisionSummary, ProvisionError<C::Error>> {
        let mut checkpoint = self.load_checkpoint()?;

        if !force {
            if let Some(summary) = self.already_configured(&checkpoint) {
                info!("✅ All components already configured (use --force to recreate)");
                return Ok(summary);
            }
        }

        let lambda_arn = self.resolve_function_arn(&mut checkpoint).await?;

        let mut teardown = None;
        if force {
            let (report, remaining) = self.reset(&checkpoint).await?;
            teardown = Some(report);
            checkpoint = remaining;
        }

        let mut steps = Vec::with_capacity(ProvisioningStep::ALL.len());
        let cognito = self.ensure_authorizer(&checkpoint, &mut steps).await?;
        let gateway = self.ensure_gateway(&checkpoint, &cognito, &mut steps).await?;
        let discovery_ready = self.wait_for_discovery(&cognito).await;
        let target_id = self
            .ensure_target(&checkpoint, &gateway, &lambda_arn, &mut steps)
            .await?;

        info!("✅ Gateway {} is ready at {}", gateway.id, gateway.url);
        Ok(ProvisionSummary {
            steps,
            gateway,
            target_id,
            client_id: cognito.client_id,
            checkpoint_path: self.store.path().to_path_buf(),
            discovery_ready: Some(discovery_ready),
            already_configured: false,
            teardown,
        })
    }

    fn load_checkpoint(&self) -> Result<Checkpoint, ProvisionError<C::Error>> {
        match self.store.load() {
            Ok(checkpoint) => Ok(checkpoint),
            Err(err) if err.is_not_found() => {
                info!("No checkpoint at {}; starting fresh", self.store.path());
                Ok(Checkpoint::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn already_configured(&self, checkpoint: &Checkpoint) -> Option<ProvisionSummary> {
        let cognito = checkpoint.cognito.as_ref()?;
        let gateway = checkpoint.gateway()?;
        let target_id = checkpoint.target_id()?;
        Some(ProvisionSummary {
            steps: ProvisioningStep::ALL
                .into_iter()
                .map(|step| StepReport {
                    step,
                    action: StepAction::Reused,
                })
                .collect(),
            gateway,
            target_id: target_id.to_owned(),
            client_id: cognito.client_id.clone(),
            checkpoint_path: self.store.path().to_path_buf(),
            discovery_ready: None,
            already_configured: true,
            teardown: None,
        })
    }

    async fn resolve_function_arn(
        &self,
        checkpoint: &mut Checkpoint,
    ) -> Result<String, ProvisionError<C::Error>> {
        if let Some(arn) = &self.settings.function_arn_override {
            info!("Using function ARN from the command line: {arn}");
            return Ok(arn.clone());
        }
        if let Some(arn) = &checkpoint.lambda_arn {
            info!("Using function ARN from the checkpoint: {arn}");
            return Ok(arn.clone());
        }

        let stack_name = &self.settings.stack_name;
        info!("⏳ Looking up function ARN in stack {stack_name}");
        let found = self
            .control
            .stack_output(stack_name, &self.settings.function_output_key)
            .await
            .map_err(ProvisionError::FunctionLookup)?;
        let Some(arn) = found else {
            return Err(ProvisionError::function_arn_missing(stack_name));
        };

        let partial = Checkpoint::with_stack_function(arn.clone(), stack_name.clone());
        self.store.save(partial.clone())?;
        checkpoint.merge(partial);
        info!("✅ Resolved function ARN from stack outputs: {arn}");
        Ok(arn)
    }

    async fn reset(
        &self,
        checkpoint: &Checkpoint,
    ) -> Result<(TeardownReport, Checkpoint), ProvisionError<C::Error>> {
        warn!("⚠️ Forcing recreation; tearing down recorded resources");
        let coordinator = TeardownCoordinator::new(
            &self.control,
            &self.store,
            self.settings.resource_server_id.clone(),
        );
        let report = coordinator.teardown(checkpoint).await;

        let carried = checkpoint.function_record();
        if !carried.is_empty() {
            self.store.save(carried.clone())?;
        }
        Ok((report, carried))
    }

    async fn ensure_authorizer(
        &self,
        checkpoint: &Checkpoint,
        steps: &mut Vec<StepReport>,
    ) -> Result<CognitoRecord, ProvisionError<C::Error>> {
        let step = ProvisioningStep::Authorizer;
        if let Some(cognito) = checkpoint.cognito.as_ref() {
            info!("Reusing {} for client {}", step.name(), cognito.client_id);
            steps.push(reused(step));
            return Ok(cognito.clone());
        }

        info!("⏳ Creating {}", step.name());
        let request = AuthorizerRequest {
            resource_server_id: self.settings.resource_server_id.clone(),
            region: self.settings.region.clone(),
        };
        let cognito = self
            .control
            .create_authorizer(&request)
            .await
            .map_err(ProvisionError::Authorizer)?;
        self.store.save(Checkpoint::with_cognito(
            cognito.clone(),
            self.settings.region.clone(),
        ))?;
        info!("✅ Created {} for client {}", step.name(), cognito.client_id);
        steps.push(created(step));
        Ok(cognito)
    }

    async fn ensure_gateway(
        &self,
        checkpoint: &Checkpoint,
        cognito: &CognitoRecord,
        steps: &mut Vec<StepReport>,
    ) -> Result<GatewayHandle, ProvisionError<C::Error>> {
        let step = ProvisioningStep::Gateway;
        if let Some(gateway) = checkpoint.gateway() {
            info!("Reusing {} {}", step.name(), gateway.id);
            steps.push(reused(step));
            return Ok(gateway);
        }

        info!("⏳ Creating {} {}", step.name(), self.settings.gateway_name);
        let request = GatewayRequest {
            name: self.settings.gateway_name.clone(),
            role_arn: self.settings.gateway_role_arn.clone(),
            discovery_url: discovery_url(&self.settings.region, &cognito.user_pool_id),
            allowed_client_id: cognito.client_id.clone(),
        };
        let gateway = self
            .control
            .create_gateway(&request)
            .await
            .map_err(ProvisionError::Gateway)?;
        self.store.save(Checkpoint::with_gateway(&gateway))?;
        info!("✅ Created {} {}", step.name(), gateway.id);
        steps.push(created(step));

        let label = format!("gateway {}", gateway.id);
        self.settings
            .readiness_wait
            .require(&label, || self.gateway_check(&gateway.id))
            .await?;
        Ok(gateway)
    }

    async fn gateway_check(&self, gateway_id: &str) -> PollStatus {
        match self.control.gateway_status(gateway_id).await {
            Ok(status) => PollStatus::from_resource_status(&status, STATUS_READY, STATUS_FAILED),
            Err(err) => {
                warn!("⚠️ Gateway status check failed: {err}");
                PollStatus::Pending(format!("status unavailable: {err}"))
            }
        }
    }

    async fn wait_for_discovery(&self, cognito: &CognitoRecord) -> bool {
        let url = discovery_url(&self.settings.region, &cognito.user_pool_id);
        match self
            .settings
            .discovery_wait
            .await_condition("OIDC discovery endpoint", || self.probe.probe(&url))
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                warn!("⚠️ Discovery endpoint not ready yet; continuing, token validation may fail at first");
                false
            }
            Err(err) => {
                warn!("⚠️ Discovery endpoint check failed: {err}; continuing");
                false
            }
        }
    }

    async fn ensure_target(
        &self,
        checkpoint: &Checkpoint,
        gateway: &GatewayHandle,
        lambda_arn: &str,
        steps: &mut Vec<StepReport>,
    ) -> Result<String, ProvisionError<C::Error>> {
        let step = ProvisioningStep::Target;
        if let Some(target_id) = checkpoint.target_id() {
            info!("Reusing {} {target_id}", step.name());
            steps.push(reused(step));
            return Ok(target_id.to_owned());
        }

        info!("⏳ Creating {} bound to {lambda_arn}", step.name());
        let request = TargetRequest {
            gateway_id: gateway.id.clone(),
            name: self.settings.target_name.clone(),
            lambda_arn: lambda_arn.to_owned(),
        };
        let target_id = self
            .control
            .create_target(&request)
            .await
            .map_err(ProvisionError::Target)?;

        let label = format!("target {target_id}");
        self.settings
            .readiness_wait
            .require(&label, || self.target_check(&gateway.id, &target_id))
            .await?;

        self.store.save(Checkpoint::with_target(target_id.clone()))?;
        info!("✅ Created {} {target_id}", step.name());
        steps.push(created(step));
        Ok(target_id)
    }

    async fn target_check(&self, gateway_id: &str, target_id: &str) -> PollStatus {
        match self.control.target_status(gateway_id, target_id).await {
            Ok(status) => PollStatus::from_resource_status(&status, STATUS_READY, STATUS_FAILED),
            Err(err) => {
                warn!("⚠️ Target status check failed: {err}");
                PollStatus::Pending(format!("status unavailable: {err}"))
            }
        }
    }
}

const fn created(step: ProvisioningStep) -> StepReport {
    StepReport {
        step,
        action: StepAction::Created,
    }
}

const fn reused(step: ProvisioningStep) -> StepReport {
    StepReport {
        step,
        action: StepAction::Reused,
    }
}
