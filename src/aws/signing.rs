//! SigV4-signed HTTP calls to the AWS service endpoints.

use std::time::{Duration, SystemTime};

use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningSettings, sign};
use aws_sigv4::sign::v4;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::error::AwsError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const JSON_11: &str = "application/x-amz-json-1.1";
const COGNITO_TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CLOUDFORMATION_VERSION: &str = "2010-05-15";

/// Signing names of the services the control plane calls.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Service {
    Cognito,
    AgentCoreControl,
    CloudFormation,
}

impl Service {
    const fn signing_name(self) -> &'static str {
        match self {
            Self::Cognito => "cognito-idp",
            Self::AgentCoreControl => "bedrock-agentcore",
            Self::CloudFormation => "cloudformation",
        }
    }
}

/// Base URLs for each service, overridable for tests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoints {
    /// Cognito Identity Provider endpoint.
    pub cognito: String,
    /// Bedrock AgentCore control endpoint.
    pub agentcore_control: String,
    /// CloudFormation endpoint.
    pub cloudformation: String,
}

impl Endpoints {
    /// Public endpoints for `region`.
    #[must_use]
    pub fn for_region(region: &str) -> Self {
        Self {
            cognito: format!("https://cognito-idp.{region}.amazonaws.com"),
            agentcore_control: format!("https://bedrock-agentcore-control.{region}.amazonaws.com"),
            cloudformation: format!("https://cloudformation.{region}.amazonaws.com"),
        }
    }

    /// Sends every service to the same base URL.
    #[must_use]
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_owned();
        Self {
            cognito: base.clone(),
            agentcore_control: base.clone(),
            cloudformation: base,
        }
    }

    fn base(&self, service: Service) -> &str {
        match service {
            Service::Cognito => &self.cognito,
            Service::AgentCoreControl => &self.agentcore_control,
            Service::CloudFormation => &self.cloudformation,
        }
    }
}

/// HTTP client that signs every request with SigV4.
#[derive(Clone, Debug)]
pub(crate) struct SignedClient {
    http: Client,
    credentials: SharedCredentialsProvider,
    region: String,
    endpoints: Endpoints,
}

impl SignedClient {
    pub(crate) fn new(
        credentials: SharedCredentialsProvider,
        region: &str,
        endpoints: Endpoints,
    ) -> Result<Self, AwsError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| AwsError::Config(format!("failed to create HTTP client: {err}")))?;
        Ok(Self {
            http,
            credentials,
            region: region.to_owned(),
            endpoints,
        })
    }

    pub(crate) fn region(&self) -> &str {
        &self.region
    }

    /// Calls a Cognito JSON 1.1 operation.
    pub(crate) async fn cognito(&self, operation: &str, body: &Value) -> Result<Value, AwsError> {
        let url = format!("{}/", self.endpoints.base(Service::Cognito));
        let target = format!("{COGNITO_TARGET_PREFIX}.{operation}");
        let payload = body.to_string();
        let headers = vec![
            ("content-type", String::from(JSON_11)),
            ("x-amz-target", target),
        ];
        self.send(Service::Cognito, operation, Method::POST, &url, headers, payload)
            .await
    }

    /// Calls an AgentCore control REST JSON operation.
    pub(crate) async fn agentcore(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, AwsError> {
        let url = format!("{}{path}", self.endpoints.base(Service::AgentCoreControl));
        let payload = body.map(Value::to_string).unwrap_or_default();
        let mut headers = Vec::new();
        if body.is_some() {
            headers.push(("content-type", String::from("application/json")));
        }
        self.send(Service::AgentCoreControl, operation, method, &url, headers, payload)
            .await
    }

    /// Calls a CloudFormation query operation, asking for a JSON response.
    pub(crate) async fn cloudformation(
        &self,
        operation: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, AwsError> {
        let url = format!("{}/", self.endpoints.base(Service::CloudFormation));
        let body = form_body(operation, params);
        let headers = vec![
            (
                "content-type",
                String::from("application/x-www-form-urlencoded; charset=utf-8"),
            ),
            ("accept", String::from("application/json")),
        ];
        self.send(
            Service::CloudFormation,
            operation,
            Method::POST,
            &url,
            headers,
            body,
        )
        .await
    }

    async fn send(
        &self,
        service: Service,
        operation: &str,
        method: Method,
        url: &str,
        mut headers: Vec<(&'static str, String)>,
        body: String,
    ) -> Result<Value, AwsError> {
        let parsed = Url::parse(url)
            .map_err(|err| AwsError::Config(format!("invalid endpoint {url}: {err}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AwsError::Config(format!("endpoint {url} has no host")))?;
        let authority = parsed
            .port()
            .map_or_else(|| host.to_owned(), |port| format!("{host}:{port}"));
        headers.push(("host", authority));

        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|err| AwsError::Credentials(err.to_string()))?;
        let identity = credentials.into();
        let signing_params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(service.signing_name())
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|err| signing_error(operation, &err))?;

        let signable = SignableRequest::new(
            method.as_str(),
            url,
            headers.iter().map(|(name, value)| (*name, value.as_str())),
            SignableBody::Bytes(body.as_bytes()),
        )
        .map_err(|err| signing_error(operation, &err))?;
        let (instructions, _signature) = sign(signable, &signing_params.into())
            .map_err(|err| signing_error(operation, &err))?
            .into_parts();

        let mut request = self.http.request(method, url);
        for (name, value) in &headers {
            request = request.header(*name, value.as_str());
        }
        for (name, value) in instructions.headers() {
            request = request.header(name, value);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        debug!(service = service.signing_name(), operation, "calling AWS");
        let response = request.send().await.map_err(|err| AwsError::Transport {
            operation: operation.to_owned(),
            message: err.to_string(),
        })?;

        let status = response.status();
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let text = response.text().await.map_err(|err| AwsError::Transport {
            operation: operation.to_owned(),
            message: err.to_string(),
        })?;

        if !status.is_success() {
            return Err(AwsError::from_response(
                service.signing_name(),
                operation,
                status.as_u16(),
                error_type.as_deref(),
                &text,
            ));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| AwsError::Response {
            operation: operation.to_owned(),
            message: err.to_string(),
        })
    }
}

// The serializer is not `Send`, so it must not live across an await.
fn form_body(operation: &str, params: &[(&str, &str)]) -> String {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    form.append_pair("Action", operation);
    form.append_pair("Version", CLOUDFORMATION_VERSION);
    for (key, value) in params {
        form.append_pair(key, value);
    }
    form.finish()
}

fn signing_error(operation: &str, err: &dyn std::fmt::Display) -> AwsError {
    AwsError::Signing {
        operation: operation.to_owned(),
        message: err.to_string(),
    }
}
