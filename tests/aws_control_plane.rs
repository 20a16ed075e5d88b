//! Wire-level checks for the AWS control plane against a mock endpoint.

use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use gatewright::{AuthorizerRequest, AwsControlPlane, AwsError, ControlPlane, Endpoints};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COGNITO_PREFIX: &str = "AWSCognitoIdentityProviderService";

fn control_plane(server: &MockServer) -> AwsControlPlane {
    let credentials = Credentials::new("AKIDEXAMPLE", "secret", None, None, "static");
    AwsControlPlane::with_credentials(
        "us-east-1",
        SharedCredentialsProvider::new(credentials),
        Endpoints::single(&server.uri()),
    )
    .unwrap_or_else(|err| panic!("control plane should build: {err}"))
}

fn authorizer_request() -> AuthorizerRequest {
    AuthorizerRequest {
        resource_server_id: String::from("AWSCostEstimationResourceServer"),
        region: String::from("us-east-1"),
    }
}

async fn cognito_answers(server: &MockServer, operation: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(header("x-amz-target", format!("{COGNITO_PREFIX}.{operation}").as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn cognito_operations(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request| request.headers.get("x-amz-target"))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|target| target.strip_prefix(&format!("{COGNITO_PREFIX}.")).map(str::to_owned))
        .collect()
}

fn rejected() -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "__type": "InvalidParameterException",
        "message": "rejected"
    }))
}

#[tokio::test]
async fn authorizer_is_created_in_four_calls() {
    let server = MockServer::start().await;
    cognito_answers(
        &server,
        "CreateUserPool",
        ResponseTemplate::new(200).set_body_json(json!({"UserPool": {"Id": "us-east-1_pool"}})),
    )
    .await;
    cognito_answers(&server, "CreateUserPoolDomain", ResponseTemplate::new(200).set_body_json(json!({}))).await;
    cognito_answers(&server, "CreateResourceServer", ResponseTemplate::new(200).set_body_json(json!({}))).await;
    cognito_answers(
        &server,
        "CreateUserPoolClient",
        ResponseTemplate::new(200).set_body_json(json!({
            "UserPoolClient": {"ClientId": "client-1", "ClientSecret": "secret-1"}
        })),
    )
    .await;

    let record = control_plane(&server)
        .create_authorizer(&authorizer_request())
        .await
        .unwrap_or_else(|err| panic!("authorizer should be created: {err}"));

    assert_eq!(record.user_pool_id, "us-east-1_pool");
    assert_eq!(record.client_id, "client-1");
    assert_eq!(record.scope, "AWSCostEstimationResourceServer/invoke");
    assert_eq!(
        cognito_operations(&server).await,
        [
            "CreateUserPool",
            "CreateUserPoolDomain",
            "CreateResourceServer",
            "CreateUserPoolClient"
        ]
    );
}

#[tokio::test]
async fn failed_domain_creation_deletes_the_new_pool() {
    let server = MockServer::start().await;
    cognito_answers(
        &server,
        "CreateUserPool",
        ResponseTemplate::new(200).set_body_json(json!({"UserPool": {"Id": "us-east-1_orphan"}})),
    )
    .await;
    cognito_answers(&server, "CreateUserPoolDomain", rejected()).await;
    cognito_answers(&server, "DeleteUserPool", ResponseTemplate::new(200).set_body_json(json!({}))).await;

    let err = control_plane(&server)
        .create_authorizer(&authorizer_request())
        .await
        .err()
        .unwrap_or_else(|| panic!("domain rejection should fail the authorizer"));

    assert!(matches!(err, AwsError::Api { ref operation, .. } if operation == "CreateUserPoolDomain"));
    assert_eq!(
        cognito_operations(&server).await,
        ["CreateUserPool", "CreateUserPoolDomain", "DeleteUserPool"]
    );
}

#[tokio::test]
async fn later_failure_removes_domain_before_pool() {
    let server = MockServer::start().await;
    cognito_answers(
        &server,
        "CreateUserPool",
        ResponseTemplate::new(200).set_body_json(json!({"UserPool": {"Id": "us-east-1_orphan"}})),
    )
    .await;
    cognito_answers(&server, "CreateUserPoolDomain", ResponseTemplate::new(200).set_body_json(json!({}))).await;
    cognito_answers(&server, "CreateResourceServer", rejected()).await;
    cognito_answers(&server, "DeleteUserPoolDomain", ResponseTemplate::new(200).set_body_json(json!({}))).await;
    cognito_answers(&server, "DeleteUserPool", ResponseTemplate::new(200).set_body_json(json!({}))).await;

    let err = control_plane(&server)
        .create_authorizer(&authorizer_request())
        .await
        .err()
        .unwrap_or_else(|| panic!("resource server rejection should fail the authorizer"));

    assert!(matches!(err, AwsError::Api { ref operation, .. } if operation == "CreateResourceServer"));
    assert_eq!(
        cognito_operations(&server).await,
        [
            "CreateUserPool",
            "CreateUserPoolDomain",
            "CreateResourceServer",
            "DeleteUserPoolDomain",
            "DeleteUserPool"
        ]
    );
}

#[tokio::test]
async fn stack_output_is_read_from_describe_stacks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header_exists("authorization"))
        .and(body_string_contains("Action=DescribeStacks"))
        .and(body_string_contains("StackName=AWS-Cost-Estimator-Agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "DescribeStacksResponse": {
                "DescribeStacksResult": {
                    "Stacks": [{
                        "Outputs": [{
                            "OutputKey": "AgentCoreGatewayFunctionArn",
                            "OutputValue": "arn:aws:lambda:us-east-1:1:function:f"
                        }]
                    }]
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = control_plane(&server)
        .stack_output("AWS-Cost-Estimator-Agent", "AgentCoreGatewayFunctionArn")
        .await
        .unwrap_or_else(|err| panic!("lookup should succeed: {err}"));

    assert_eq!(found.as_deref(), Some("arn:aws:lambda:us-east-1:1:function:f"));
}

#[tokio::test]
async fn missing_stack_yields_no_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "Error": {
                "Code": "ValidationError",
                "Message": "Stack with id AWS-Cost-Estimator-Agent does not exist"
            }
        })))
        .mount(&server)
        .await;

    let found = control_plane(&server)
        .stack_output("AWS-Cost-Estimator-Agent", "AgentCoreGatewayFunctionArn")
        .await
        .unwrap_or_else(|err| panic!("missing stack should not error: {err}"));

    assert!(found.is_none());
}

#[tokio::test]
async fn gateway_status_is_signed_for_agentcore() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gateways/gw-1/"))
        .and(header_exists("authorization"))
        .and(header_exists("x-amz-date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "READY"})))
        .expect(1)
        .mount(&server)
        .await;

    let status = control_plane(&server)
        .gateway_status("gw-1")
        .await
        .unwrap_or_else(|err| panic!("status should succeed: {err}"));

    assert_eq!(status, "READY");
}

#[tokio::test]
async fn missing_gateway_is_reported_as_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/gateways/gw-gone/"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("x-amzn-errortype", "ResourceNotFoundException:http://internal/")
                .set_body_json(json!({"message": "Gateway gw-gone not found"})),
        )
        .mount(&server)
        .await;

    let err = control_plane(&server)
        .delete_gateway("gw-gone")
        .await
        .err()
        .unwrap_or_else(|| panic!("deleting a missing gateway should fail"));

    assert!(err.is_not_found(), "unexpected error: {err}");
    let AwsError::Api { code, .. } = err else {
        panic!("expected an API error");
    };
    assert_eq!(code, "ResourceNotFoundException");
}

#[tokio::test]
async fn cognito_calls_carry_the_json_target_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header(
            "x-amz-target",
            "AWSCognitoIdentityProviderService.DeleteUserPool",
        ))
        .and(header("content-type", "application/x-amz-json-1.1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    control_plane(&server)
        .delete_authorizer_part(&gatewright::AuthorizerPart::UserPool {
            user_pool_id: String::from("us-east-1_pool"),
        })
        .await
        .unwrap_or_else(|err| panic!("pool deletion should succeed: {err}"));
}
