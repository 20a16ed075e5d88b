//! Checkpoint data model persisted between provisioning runs.
//!
//! The checkpoint is the only record of which remote resources already
//! exist. Each successful creation step merges its block into the file
//! immediately, so an interrupted run resumes from the last completed step.
//! Keys the crate does not understand are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::control::GatewayHandle;

/// Value recorded in [`Checkpoint::source`] when the function ARN came from
/// a stack output.
pub const STACK_SOURCE: &str = "cloudformation";

/// Machine-to-machine client details for the OAuth authorizer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CognitoRecord {
    /// App client identifier allowed to use the client-credentials flow.
    pub client_id: String,
    /// App client secret.
    pub client_secret: String,
    /// OAuth2 token endpoint on the hosted domain.
    pub token_endpoint: String,
    /// Scope requested when exchanging client credentials.
    pub scope: String,
    /// Identifier of the user pool that owns the client.
    pub user_pool_id: String,
    /// Hosted domain prefix, needed to delete the domain on teardown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_prefix: Option<String>,
    /// Resource server identifier carrying the `invoke` scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_server_id: Option<String>,
}

/// Persisted provisioning progress.
///
/// Every field is optional because the file is written incrementally.
/// [`Checkpoint::merge`] replaces whole top-level keys; nested blocks such
/// as `cognito` are never merged field by field.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Checkpoint {
    /// Authorizer block written once the user pool and client exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognito: Option<CognitoRecord>,
    /// Gateway identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
    /// MCP endpoint URL of the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    /// Identifier of the Lambda target attached to the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Region the resources were created in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// ARN of the function backing the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda_arn: Option<String>,
    /// Stack the function ARN was resolved from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_name: Option<String>,
    /// Where the function ARN came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Keys written by other tools, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Checkpoint {
    /// Partial checkpoint carrying only the authorizer block and region.
    #[must_use]
    pub fn with_cognito(record: CognitoRecord, region: impl Into<String>) -> Self {
        Self {
            cognito: Some(record),
            region: Some(region.into()),
            ..Self::default()
        }
    }

    /// Partial checkpoint carrying only the gateway identifiers.
    #[must_use]
    pub fn with_gateway(handle: &GatewayHandle) -> Self {
        Self {
            gateway_id: Some(handle.id.clone()),
            gateway_url: Some(handle.url.clone()),
            ..Self::default()
        }
    }

    /// Partial checkpoint carrying only the target identifier.
    #[must_use]
    pub fn with_target(target_id: impl Into<String>) -> Self {
        Self {
            target_id: Some(target_id.into()),
            ..Self::default()
        }
    }

    /// Partial checkpoint recording a function ARN resolved from a stack.
    #[must_use]
    pub fn with_stack_function(lambda_arn: impl Into<String>, stack_name: impl Into<String>) -> Self {
        Self {
            lambda_arn: Some(lambda_arn.into()),
            stack_name: Some(stack_name.into()),
            source: Some(STACK_SOURCE.to_owned()),
            ..Self::default()
        }
    }

    /// Copy of the function record alone, used to carry it across a
    /// forced teardown.
    #[must_use]
    pub fn function_record(&self) -> Self {
        Self {
            lambda_arn: self.lambda_arn.clone(),
            stack_name: self.stack_name.clone(),
            source: self.source.clone(),
            ..Self::default()
        }
    }

    /// Returns `true` when no key, known or unknown, is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Creates or replaces each top-level key present in `partial`.
    pub fn merge(&mut self, partial: Self) {
        fn take<T>(slot: &mut Option<T>, incoming: Option<T>) {
            if incoming.is_some() {
                *slot = incoming;
            }
        }

        take(&mut self.cognito, partial.cognito);
        take(&mut self.gateway_id, partial.gateway_id);
        take(&mut self.gateway_url, partial.gateway_url);
        take(&mut self.target_id, partial.target_id);
        take(&mut self.region, partial.region);
        take(&mut self.lambda_arn, partial.lambda_arn);
        take(&mut self.stack_name, partial.stack_name);
        take(&mut self.source, partial.source);
        self.extra.extend(partial.extra);
    }

    /// Returns `true` once the authorizer block has been recorded.
    #[must_use]
    pub const fn has_authorizer(&self) -> bool {
        self.cognito.is_some()
    }

    /// Gateway handle when both the identifier and URL are recorded.
    #[must_use]
    pub fn gateway(&self) -> Option<GatewayHandle> {
        match (&self.gateway_id, &self.gateway_url) {
            (Some(id), Some(url)) => Some(GatewayHandle {
                id: id.clone(),
                url: url.clone(),
            }),
            _ => None,
        }
    }

    /// Recorded target identifier, if any.
    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    /// Returns `true` when the authorizer, gateway and target are all
    /// recorded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.has_authorizer() && self.gateway().is_some() && self.target_id.is_some()
    }
}
