//! AWS implementation of the gateway control plane.
//!
//! Calls are plain SigV4-signed HTTP requests against the Cognito Identity
//! Provider, Bedrock AgentCore control and CloudFormation endpoints.

mod cognito;
mod error;
mod gateway;
mod signing;
mod stack;

use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_types::region::Region;

use crate::checkpoint::CognitoRecord;
use crate::control::{
    AuthorizerPart, AuthorizerRequest, ControlFuture, ControlPlane, GatewayHandle, GatewayRequest,
    TargetRequest,
};
use signing::SignedClient;

pub use cognito::token_endpoint;
pub use error::AwsError;
pub use signing::Endpoints;

/// Control plane that talks to AWS with credentials from the default chain.
#[derive(Clone, Debug)]
pub struct AwsControlPlane {
    client: SignedClient,
}

impl AwsControlPlane {
    /// Loads credentials from the standard AWS provider chain.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError::Credentials`] when no credentials provider is
    /// configured and [`AwsError::Config`] when the HTTP client cannot be
    /// built.
    pub async fn from_env(region: &str) -> Result<Self, AwsError> {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .load()
            .await;
        let credentials = config.credentials_provider().ok_or_else(|| {
            AwsError::Credentials(String::from(
                "no AWS credentials found; configure environment variables, ~/.aws/credentials, or an IAM role",
            ))
        })?;
        Self::with_credentials(region, credentials, Endpoints::for_region(region))
    }

    /// Builds a control plane with explicit credentials and endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`AwsError::Config`] when the HTTP client cannot be built.
    pub fn with_credentials(
        region: &str,
        credentials: SharedCredentialsProvider,
        endpoints: Endpoints,
    ) -> Result<Self, AwsError> {
        Ok(Self {
            client: SignedClient::new(credentials, region, endpoints)?,
        })
    }

    /// Region every call is signed for.
    #[must_use]
    pub fn region(&self) -> &str {
        self.client.region()
    }
}

impl ControlPlane for AwsControlPlane {
    type Error = AwsError;

    fn create_authorizer<'a>(
        &'a self,
        request: &'a AuthorizerRequest,
    ) -> ControlFuture<'a, CognitoRecord, Self::Error> {
        Box::pin(async move { self.create_cognito_authorizer(request).await })
    }

    fn create_gateway<'a>(
        &'a self,
        request: &'a GatewayRequest,
    ) -> ControlFuture<'a, GatewayHandle, Self::Error> {
        Box::pin(async move { self.create_mcp_gateway(request).await })
    }

    fn gateway_status<'a>(&'a self, gateway_id: &'a str) -> ControlFuture<'a, String, Self::Error> {
        Box::pin(async move { self.fetch_gateway_status(gateway_id).await })
    }

    fn create_target<'a>(
        &'a self,
        request: &'a TargetRequest,
    ) -> ControlFuture<'a, String, Self::Error> {
        Box::pin(async move { self.create_lambda_target(request).await })
    }

    fn target_status<'a>(
        &'a self,
        gateway_id: &'a str,
        target_id: &'a str,
    ) -> ControlFuture<'a, String, Self::Error> {
        Box::pin(async move { self.fetch_target_status(gateway_id, target_id).await })
    }

    fn delete_target<'a>(
        &'a self,
        gateway_id: &'a str,
        target_id: &'a str,
    ) -> ControlFuture<'a, (), Self::Error> {
        Box::pin(async move { self.remove_target(gateway_id, target_id).await })
    }

    fn delete_gateway<'a>(&'a self, gateway_id: &'a str) -> ControlFuture<'a, (), Self::Error> {
        Box::pin(async move { self.remove_gateway(gateway_id).await })
    }

    fn delete_authorizer_part<'a>(
        &'a self,
        part: &'a AuthorizerPart,
    ) -> ControlFuture<'a, (), Self::Error> {
        Box::pin(async move { self.delete_cognito_part(part).await })
    }

    fn stack_output<'a>(
        &'a self,
        stack_name: &'a str,
        output_key: &'a str,
    ) -> ControlFuture<'a, Option<String>, Self::Error> {
        Box::pin(async move { self.describe_stack_output(stack_name, output_key).await })
    }
}
