//! AgentCore gateway and target calls.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::control::{GatewayHandle, GatewayRequest, TargetRequest};

use super::AwsControlPlane;
use super::error::AwsError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateGateway<'a> {
    name: &'a str,
    role_arn: &'a str,
    protocol_type: &'static str,
    authorizer_type: &'static str,
    authorizer_configuration: AuthorizerConfiguration<'a>,
    client_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizerConfiguration<'a> {
    #[serde(rename = "customJWTAuthorizer")]
    custom_jwt_authorizer: CustomJwtAuthorizer<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomJwtAuthorizer<'a> {
    discovery_url: &'a str,
    allowed_clients: [&'a str; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGatewayResponse {
    gateway_id: String,
    gateway_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTargetResponse {
    target_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

fn create_gateway_body(request: &GatewayRequest) -> Result<Value, AwsError> {
    let body = CreateGateway {
        name: &request.name,
        role_arn: &request.role_arn,
        protocol_type: "MCP",
        authorizer_type: "CUSTOM_JWT",
        authorizer_configuration: AuthorizerConfiguration {
            custom_jwt_authorizer: CustomJwtAuthorizer {
                discovery_url: &request.discovery_url,
                allowed_clients: [request.allowed_client_id.as_str()],
            },
        },
        client_token: Uuid::new_v4().to_string(),
    };
    serde_json::to_value(body).map_err(|err| AwsError::Response {
        operation: String::from("CreateGateway"),
        message: err.to_string(),
    })
}

fn decode<T: for<'de> Deserialize<'de>>(operation: &str, value: Value) -> Result<T, AwsError> {
    serde_json::from_value(value).map_err(|err| AwsError::Response {
        operation: operation.to_owned(),
        message: err.to_string(),
    })
}

impl AwsControlPlane {
    pub(super) async fn create_mcp_gateway(
        &self,
        request: &GatewayRequest,
    ) -> Result<GatewayHandle, AwsError> {
        let body = create_gateway_body(request)?;
        let response = self
            .client
            .agentcore("CreateGateway", Method::POST, "/gateways/", Some(&body))
            .await?;
        let created = decode::<CreateGatewayResponse>("CreateGateway", response)?;
        info!("✅ Gateway created: {}", created.gateway_id);
        Ok(GatewayHandle {
            id: created.gateway_id,
            url: created.gateway_url,
        })
    }

    pub(super) async fn fetch_gateway_status(&self, gateway_id: &str) -> Result<String, AwsError> {
        let path = format!("/gateways/{gateway_id}/");
        let response = self
            .client
            .agentcore("GetGateway", Method::GET, &path, None)
            .await?;
        Ok(decode::<StatusResponse>("GetGateway", response)?.status)
    }

    pub(super) async fn create_lambda_target(
        &self,
        request: &TargetRequest,
    ) -> Result<String, AwsError> {
        let path = format!("/gateways/{}/targets/", request.gateway_id);
        let mut body = request.payload();
        if let Some(object) = body.as_object_mut() {
            object.insert(
                String::from("clientToken"),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
        let response = self
            .client
            .agentcore("CreateGatewayTarget", Method::POST, &path, Some(&body))
            .await?;
        Ok(decode::<CreateTargetResponse>("CreateGatewayTarget", response)?.target_id)
    }

    pub(super) async fn fetch_target_status(
        &self,
        gateway_id: &str,
        target_id: &str,
    ) -> Result<String, AwsError> {
        let path = format!("/gateways/{gateway_id}/targets/{target_id}/");
        let response = self
            .client
            .agentcore("GetGatewayTarget", Method::GET, &path, None)
            .await?;
        Ok(decode::<StatusResponse>("GetGatewayTarget", response)?.status)
    }

    pub(super) async fn remove_target(
        &self,
        gateway_id: &str,
        target_id: &str,
    ) -> Result<(), AwsError> {
        let path = format!("/gateways/{gateway_id}/targets/{target_id}/");
        self.client
            .agentcore("DeleteGatewayTarget", Method::DELETE, &path, None)
            .await
            .map(|_| ())
    }

    pub(super) async fn remove_gateway(&self, gateway_id: &str) -> Result<(), AwsError> {
        let path = format!("/gateways/{gateway_id}/");
        self.client
            .agentcore("DeleteGateway", Method::DELETE, &path, None)
            .await
            .map(|_| ())
    }
}
