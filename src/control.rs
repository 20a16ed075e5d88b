//! Control-plane abstraction for the remote resources behind a gateway.
//!
//! The provisioner and teardown coordinator only talk to the cloud through
//! [`ControlPlane`], so tests can swap in a scripted double.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::{Value, json};

use crate::checkpoint::CognitoRecord;

/// Name of the single tool exposed through the gateway target.
pub const TOOL_NAME: &str = "aws_cost_estimation";

/// Credential provider the gateway uses to invoke the function.
pub const CREDENTIAL_PROVIDER_TYPE: &str = "GATEWAY_IAM_ROLE";

/// Status reported once a gateway or target is usable.
pub const STATUS_READY: &str = "READY";

/// Status reported when gateway or target creation failed.
pub const STATUS_FAILED: &str = "FAILED";

/// Parameters for creating the OAuth authorizer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthorizerRequest {
    /// Identifier of the resource server that carries the `invoke` scope.
    pub resource_server_id: String,
    /// Region hosting the user pool.
    pub region: String,
}

/// Parameters for creating the MCP gateway.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GatewayRequest {
    /// Gateway name.
    pub name: String,
    /// IAM role the gateway assumes to call its targets.
    pub role_arn: String,
    /// OIDC discovery document trusted by the JWT authorizer.
    pub discovery_url: String,
    /// App client allowed to present tokens.
    pub allowed_client_id: String,
}

/// Identifiers of a created gateway.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GatewayHandle {
    /// Provider identifier.
    pub id: String,
    /// MCP endpoint URL.
    pub url: String,
}

/// Parameters for binding a Lambda function to a gateway.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TargetRequest {
    /// Gateway receiving the target.
    pub gateway_id: String,
    /// Target name.
    pub name: String,
    /// Function implementing the tool.
    pub lambda_arn: String,
}

impl TargetRequest {
    /// Inline tool schema advertised by the target.
    #[must_use]
    pub fn tool_schema() -> Value {
        json!([{
            "name": TOOL_NAME,
            "description": "Estimate AWS costs for a given architecture description",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "architecture_description": {
                        "type": "string",
                        "description": "Description of the AWS architecture to estimate costs for"
                    }
                },
                "required": ["architecture_description"]
            }
        }])
    }

    /// Request body for the create-target call.
    #[must_use]
    pub fn payload(&self) -> Value {
        json!({
            "name": self.name,
            "targetConfiguration": {
                "mcp": {
                    "lambda": {
                        "lambdaArn": self.lambda_arn,
                        "toolSchema": {"inlinePayload": Self::tool_schema()}
                    }
                }
            },
            "credentialProviderConfigurations": [
                {"credentialProviderType": CREDENTIAL_PROVIDER_TYPE}
            ]
        })
    }
}

/// Pieces of the authorizer that are deleted individually.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthorizerPart {
    /// App client inside the pool.
    AppClient {
        /// Owning pool.
        user_pool_id: String,
        /// Client identifier.
        client_id: String,
    },
    /// Resource server inside the pool.
    ResourceServer {
        /// Owning pool.
        user_pool_id: String,
        /// Resource server identifier.
        identifier: String,
    },
    /// Hosted domain of the pool.
    Domain {
        /// Owning pool.
        user_pool_id: String,
        /// Domain prefix.
        domain: String,
    },
    /// The pool itself.
    UserPool {
        /// Pool identifier.
        user_pool_id: String,
    },
}

impl fmt::Display for AuthorizerPart {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppClient { client_id, .. } => write!(formatter, "app client {client_id}"),
            Self::ResourceServer { identifier, .. } => {
                write!(formatter, "resource server {identifier}")
            }
            Self::Domain { domain, .. } => write!(formatter, "user pool domain {domain}"),
            Self::UserPool { user_pool_id } => write!(formatter, "user pool {user_pool_id}"),
        }
    }
}

/// Future returned by control-plane operations.
pub type ControlFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Remote operations needed to provision and tear down a gateway.
pub trait ControlPlane {
    /// Provider specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates the user pool, domain, resource server and app client.
    fn create_authorizer<'a>(
        &'a self,
        request: &'a AuthorizerRequest,
    ) -> ControlFuture<'a, CognitoRecord, Self::Error>;

    /// Creates the MCP gateway.
    fn create_gateway<'a>(
        &'a self,
        request: &'a GatewayRequest,
    ) -> ControlFuture<'a, GatewayHandle, Self::Error>;

    /// Reports the provider status string for a gateway.
    fn gateway_status<'a>(&'a self, gateway_id: &'a str) -> ControlFuture<'a, String, Self::Error>;

    /// Submits the Lambda target and returns its identifier.
    fn create_target<'a>(
        &'a self,
        request: &'a TargetRequest,
    ) -> ControlFuture<'a, String, Self::Error>;

    /// Reports the provider status string for a target.
    fn target_status<'a>(
        &'a self,
        gateway_id: &'a str,
        target_id: &'a str,
    ) -> ControlFuture<'a, String, Self::Error>;

    /// Deletes a gateway target.
    fn delete_target<'a>(
        &'a self,
        gateway_id: &'a str,
        target_id: &'a str,
    ) -> ControlFuture<'a, (), Self::Error>;

    /// Deletes a gateway.
    fn delete_gateway<'a>(&'a self, gateway_id: &'a str) -> ControlFuture<'a, (), Self::Error>;

    /// Deletes one piece of the authorizer.
    fn delete_authorizer_part<'a>(
        &'a self,
        part: &'a AuthorizerPart,
    ) -> ControlFuture<'a, (), Self::Error>;

    /// Looks up a named output of a deployed stack.
    fn stack_output<'a>(
        &'a self,
        stack_name: &'a str,
        output_key: &'a str,
    ) -> ControlFuture<'a, Option<String>, Self::Error>;
}
