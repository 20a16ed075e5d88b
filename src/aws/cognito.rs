//! Cognito user pool setup for machine-to-machine OAuth.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::checkpoint::CognitoRecord;
use crate::control::{AuthorizerPart, AuthorizerRequest};

use super::AwsControlPlane;
use super::error::AwsError;

const INVOKE_SCOPE: &str = "invoke";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateUserPool<'a> {
    pool_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateUserPoolResponse {
    user_pool: UserPool,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserPool {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateUserPoolDomain<'a> {
    domain: &'a str,
    user_pool_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateResourceServer<'a> {
    user_pool_id: &'a str,
    identifier: &'a str,
    name: &'a str,
    scopes: [ResourceServerScope<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceServerScope<'a> {
    scope_name: &'a str,
    scope_description: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateUserPoolClient<'a> {
    user_pool_id: &'a str,
    client_name: &'a str,
    generate_secret: bool,
    allowed_o_auth_flows: [&'a str; 1],
    allowed_o_auth_scopes: [&'a str; 1],
    allowed_o_auth_flows_user_pool_client: bool,
    supported_identity_providers: [&'a str; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateUserPoolClientResponse {
    user_pool_client: UserPoolClient,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserPoolClient {
    client_id: String,
    client_secret: Option<String>,
}

/// Token endpoint served by a hosted user pool domain.
#[must_use]
pub fn token_endpoint(domain_prefix: &str, region: &str) -> String {
    format!("https://{domain_prefix}.auth.{region}.amazoncognito.com/oauth2/token")
}

fn short_suffix() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

fn decode<T: for<'de> Deserialize<'de>>(operation: &str, value: Value) -> Result<T, AwsError> {
    serde_json::from_value(value).map_err(|err| AwsError::Response {
        operation: operation.to_owned(),
        message: err.to_string(),
    })
}

fn encode<T: Serialize>(operation: &str, request: &T) -> Result<Value, AwsError> {
    serde_json::to_value(request).map_err(|err| AwsError::Response {
        operation: operation.to_owned(),
        message: err.to_string(),
    })
}

struct PoolSetup<'a> {
    suffix: &'a str,
    user_pool_id: &'a str,
    domain_prefix: &'a str,
    scope: &'a str,
}

impl AwsControlPlane {
    pub(super) async fn create_cognito_authorizer(
        &self,
        request: &AuthorizerRequest,
    ) -> Result<CognitoRecord, AwsError> {
        let suffix = short_suffix();
        let pool_name = format!("agentcore-gateway-pool-{suffix}");
        let domain_prefix = format!("agentcore-{suffix}");
        let scope = format!("{}/{INVOKE_SCOPE}", request.resource_server_id);

        let response = self
            .client
            .cognito(
                "CreateUserPool",
                &encode("CreateUserPool", &CreateUserPool {
                    pool_name: &pool_name,
                })?,
            )
            .await?;
        let user_pool_id = decode::<CreateUserPoolResponse>("CreateUserPool", response)?
            .user_pool
            .id;
        info!("✅ User pool created: {user_pool_id}");

        let mut domain_created = false;
        let setup = PoolSetup {
            suffix: &suffix,
            user_pool_id: &user_pool_id,
            domain_prefix: &domain_prefix,
            scope: &scope,
        };
        match self.complete_pool(&setup, request, &mut domain_created).await {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!("⚠️ Authorizer setup failed after creating {user_pool_id}: {err}");
                self.release_pool(&user_pool_id, domain_created.then_some(domain_prefix.as_str()))
                    .await;
                Err(err)
            }
        }
    }

    async fn complete_pool(
        &self,
        setup: &PoolSetup<'_>,
        request: &AuthorizerRequest,
        domain_created: &mut bool,
    ) -> Result<CognitoRecord, AwsError> {
        self.client
            .cognito(
                "CreateUserPoolDomain",
                &encode("CreateUserPoolDomain", &CreateUserPoolDomain {
                    domain: setup.domain_prefix,
                    user_pool_id: setup.user_pool_id,
                })?,
            )
            .await?;
        *domain_created = true;

        self.client
            .cognito(
                "CreateResourceServer",
                &encode("CreateResourceServer", &CreateResourceServer {
                    user_pool_id: setup.user_pool_id,
                    identifier: &request.resource_server_id,
                    name: &request.resource_server_id,
                    scopes: [ResourceServerScope {
                        scope_name: INVOKE_SCOPE,
                        scope_description: "Invoke the gateway tools",
                    }],
                })?,
            )
            .await?;

        let client_name = format!("agentcore-client-{}", setup.suffix);
        let response = self
            .client
            .cognito(
                "CreateUserPoolClient",
                &encode("CreateUserPoolClient", &CreateUserPoolClient {
                    user_pool_id: setup.user_pool_id,
                    client_name: &client_name,
                    generate_secret: true,
                    allowed_o_auth_flows: ["client_credentials"],
                    allowed_o_auth_scopes: [setup.scope],
                    allowed_o_auth_flows_user_pool_client: true,
                    supported_identity_providers: ["COGNITO"],
                })?,
            )
            .await?;
        let client = decode::<CreateUserPoolClientResponse>("CreateUserPoolClient", response)?
            .user_pool_client;
        let client_secret = client
            .client_secret
            .ok_or_else(|| AwsError::missing_field("CreateUserPoolClient", "ClientSecret"))?;

        Ok(CognitoRecord {
            client_id: client.client_id,
            client_secret,
            token_endpoint: token_endpoint(setup.domain_prefix, &request.region),
            scope: setup.scope.to_owned(),
            user_pool_id: setup.user_pool_id.to_owned(),
            domain_prefix: Some(setup.domain_prefix.to_owned()),
            resource_server_id: Some(request.resource_server_id.clone()),
        })
    }

    // Deleting the pool removes its clients and resource servers, but the
    // domain has to go first.
    async fn release_pool(&self, user_pool_id: &str, domain: Option<&str>) {
        let mut parts = Vec::with_capacity(2);
        if let Some(domain) = domain {
            parts.push(AuthorizerPart::Domain {
                user_pool_id: user_pool_id.to_owned(),
                domain: domain.to_owned(),
            });
        }
        parts.push(AuthorizerPart::UserPool {
            user_pool_id: user_pool_id.to_owned(),
        });
        for part in parts {
            match self.delete_cognito_part(&part).await {
                Ok(()) => info!("✅ Rolled back {part}"),
                Err(err) => warn!("⚠️ Could not roll back {part}: {err}"),
            }
        }
    }

    pub(super) async fn delete_cognito_part(&self, part: &AuthorizerPart) -> Result<(), AwsError> {
        let (operation, body) = match part {
            AuthorizerPart::AppClient {
                user_pool_id,
                client_id,
            } => (
                "DeleteUserPoolClient",
                serde_json::json!({"UserPoolId": user_pool_id, "ClientId": client_id}),
            ),
            AuthorizerPart::ResourceServer {
                user_pool_id,
                identifier,
            } => (
                "DeleteResourceServer",
                serde_json::json!({"UserPoolId": user_pool_id, "Identifier": identifier}),
            ),
            AuthorizerPart::Domain {
                user_pool_id,
                domain,
            } => (
                "DeleteUserPoolDomain",
                serde_json::json!({"UserPoolId": user_pool_id, "Domain": domain}),
            ),
            AuthorizerPart::UserPool { user_pool_id } => (
                "DeleteUserPool",
                serde_json::json!({"UserPoolId": user_pool_id}),
            ),
        };
        self.client.cognito(operation, &body).await.map(|_| ())
    }
}
