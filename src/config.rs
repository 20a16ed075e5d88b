//! Configuration loading via `ortho-config`.

use std::env;
use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::config_store::{ConfigStore, DEFAULT_CHECKPOINT_FILE};
use crate::poller::Poller;
use crate::provision::ProvisionSettings;

/// Standard AWS environment variables consulted when no region is
/// configured, in order.
pub const REGION_FALLBACK_VARS: [&str; 2] = ["AWS_REGION", "AWS_DEFAULT_REGION"];

/// Provisioning settings derived from defaults, `gatewright.toml`, and
/// `GATEWRIGHT_*` environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "GATEWRIGHT",
    discovery(
        app_name = "gatewright",
        env_var = "GATEWRIGHT_CONFIG_PATH",
        config_file_name = "gatewright.toml",
        dotfile_name = ".gatewright.toml",
        project_file_name = "gatewright.toml"
    )
)]
pub struct ProvisionerConfig {
    /// Region hosting every resource. Falls back to `AWS_REGION` and then
    /// `AWS_DEFAULT_REGION` when unset.
    pub region: Option<String>,
    /// IAM role assumed by the gateway when invoking its target. Required.
    pub gateway_role_arn: Option<String>,
    /// Location of the checkpoint file.
    #[ortho_config(default = DEFAULT_CHECKPOINT_FILE.to_owned())]
    pub checkpoint_path: String,
    /// Name given to the MCP gateway.
    #[ortho_config(default = "AWSCostEstimationGateway".to_owned())]
    pub gateway_name: String,
    /// Name given to the Lambda target.
    #[ortho_config(default = "AWSCostEstimationLambdaTarget".to_owned())]
    pub target_name: String,
    /// Identifier of the resource server carrying the `invoke` scope.
    #[ortho_config(default = "AWSCostEstimationResourceServer".to_owned())]
    pub resource_server_id: String,
    /// Stack that deployed the tool function.
    #[ortho_config(default = "AWS-Cost-Estimator-Agent".to_owned())]
    pub stack_name: String,
    /// Stack output holding the function ARN.
    #[ortho_config(default = "AgentCoreGatewayFunctionArn".to_owned())]
    pub function_output_key: String,
    /// Key under which fetched tokens are cached.
    #[ortho_config(default = "agentcore-identity-for-gateway".to_owned())]
    pub credential_provider_name: String,
    /// Budget for the advisory discovery-document wait, in seconds.
    #[ortho_config(default = 600)]
    pub discovery_wait_secs: u64,
    /// Pause between discovery probes, in seconds.
    #[ortho_config(default = 30)]
    pub discovery_interval_secs: u64,
    /// Budget for gateway and target readiness, in seconds.
    #[ortho_config(default = 300)]
    pub target_wait_secs: u64,
    /// Pause between readiness checks, in seconds.
    #[ortho_config(default = 5)]
    pub target_interval_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to gatewright.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const REGION: FieldMetadata = FieldMetadata::new("AWS region", "GATEWRIGHT_REGION", "region");
const ROLE_ARN: FieldMetadata = FieldMetadata::new(
    "gateway IAM role ARN",
    "GATEWRIGHT_GATEWAY_ROLE_ARN",
    "gateway_role_arn",
);

impl ProvisionerConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("gatewright")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Configured region, or the first non-empty standard AWS region
    /// variable.
    #[must_use]
    pub fn resolved_region(&self) -> Option<String> {
        non_blank(self.region.as_deref()).map(str::to_owned).or_else(|| {
            REGION_FALLBACK_VARS.iter().find_map(|name| {
                env::var(name)
                    .ok()
                    .and_then(|value| non_blank(Some(value.as_str())).map(str::to_owned))
            })
        })
    }

    /// Returns the region, failing with guidance when none is available.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when neither configuration nor
    /// the AWS environment provide a region.
    pub fn require_region(&self) -> Result<String, ConfigError> {
        self.resolved_region().ok_or_else(|| REGION.missing())
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// the configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a wait interval is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.require_region()?;
        if non_blank(self.gateway_role_arn.as_deref()).is_none() {
            return Err(ROLE_ARN.missing());
        }
        for (key, value) in [
            ("checkpoint_path", &self.checkpoint_path),
            ("gateway_name", &self.gateway_name),
            ("target_name", &self.target_name),
            ("resource_server_id", &self.resource_server_id),
            ("stack_name", &self.stack_name),
            ("function_output_key", &self.function_output_key),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{key} must not be empty in gatewright.toml"
                )));
            }
        }
        if self.discovery_interval_secs == 0 || self.target_interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "wait intervals must be at least one second",
            )));
        }
        Ok(())
    }

    /// Checkpoint store at the configured location.
    #[must_use]
    pub fn checkpoint_store(&self) -> ConfigStore {
        ConfigStore::new(self.checkpoint_path.trim())
    }

    /// Advisory wait applied to the discovery document.
    #[must_use]
    pub const fn discovery_wait(&self) -> Poller {
        Poller::new(
            Duration::from_secs(self.discovery_wait_secs),
            Duration::from_secs(self.discovery_interval_secs),
        )
    }

    /// Required wait applied to the gateway and target.
    #[must_use]
    pub const fn readiness_wait(&self) -> Poller {
        Poller::new(
            Duration::from_secs(self.target_wait_secs),
            Duration::from_secs(self.target_interval_secs),
        )
    }

    /// Builds validated provisioning settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn provision_settings(
        &self,
        function_arn_override: Option<String>,
    ) -> Result<ProvisionSettings, ConfigError> {
        self.validate()?;
        let region = self.require_region()?;
        let gateway_role_arn = non_blank(self.gateway_role_arn.as_deref())
            .map(str::to_owned)
            .ok_or_else(|| ROLE_ARN.missing())?;

        Ok(ProvisionSettings {
            region,
            gateway_role_arn,
            gateway_name: self.gateway_name.trim().to_owned(),
            target_name: self.target_name.trim().to_owned(),
            resource_server_id: self.resource_server_id.trim().to_owned(),
            stack_name: self.stack_name.trim().to_owned(),
            function_output_key: self.function_output_key.trim().to_owned(),
            function_arn_override: function_arn_override
                .as_deref()
                .and_then(|value| non_blank(Some(value)))
                .map(str::to_owned),
            discovery_wait: self.discovery_wait(),
            readiness_wait: self.readiness_wait(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|trimmed| !trimmed.is_empty())
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
