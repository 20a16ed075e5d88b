//! OIDC discovery endpoint probe.
//!
//! Freshly created user pools take a while before their discovery document
//! is served. The gateway's JWT authorizer fetches that document, so the
//! provisioner polls it with a [`Poller`](crate::poller::Poller) using this
//! probe.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::warn;

use crate::poller::PollStatus;

/// Per-request timeout for discovery probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Discovery document URL for a user pool.
#[must_use]
pub fn discovery_url(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}/.well-known/openid-configuration")
}

/// Future returned by an endpoint probe.
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = PollStatus> + Send + 'a>>;

/// Single readiness check against an HTTP endpoint.
pub trait EndpointProbe {
    /// Checks `url` once and classifies the response.
    fn probe<'a>(&'a self, url: &'a str) -> ProbeFuture<'a>;
}

/// Probe for OIDC discovery documents.
#[derive(Clone, Debug)]
pub struct DiscoveryProbe {
    client: Client,
}

impl DiscoveryProbe {
    /// Builds a probe with the standard per-request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    /// Builds a probe with a custom per-request timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!("⚠️ Falling back to default HTTP client: {err}");
                Client::new()
            });
        Self { client }
    }

    async fn check(&self, url: &str) -> PollStatus {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return PollStatus::Pending(String::from("request timed out"));
            }
            Err(err) => return PollStatus::Pending(format!("connection error: {err}")),
        };

        let status = response.status();
        if status == StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return classify_document(&body);
        }
        if status == StatusCode::NOT_FOUND {
            return PollStatus::Pending(String::from("not found yet (404)"));
        }
        if status.is_server_error() {
            return PollStatus::Pending(format!(
                "service may be initialising ({})",
                status.as_u16()
            ));
        }
        PollStatus::Pending(format!("unexpected status {}", status.as_u16()))
    }
}

impl Default for DiscoveryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointProbe for DiscoveryProbe {
    fn probe<'a>(&'a self, url: &'a str) -> ProbeFuture<'a> {
        Box::pin(self.check(url))
    }
}

fn classify_document(body: &str) -> PollStatus {
    match serde_json::from_str::<Value>(body) {
        Ok(document) if document.get("issuer").is_some() => {
            PollStatus::Ready(String::from("discovery document served"))
        }
        Ok(_) => {
            warn!("⚠️ Discovery document is missing the issuer field");
            PollStatus::Pending(String::from("document without issuer"))
        }
        Err(_) => {
            warn!("⚠️ Discovery endpoint returned a non-JSON body");
            PollStatus::Pending(String::from("non-JSON document"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOC_PATH: &str = "/us-east-1_pool/.well-known/openid-configuration";

    async fn probe_with(response: ResponseTemplate) -> PollStatus {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .respond_with(response)
            .mount(&server)
            .await;

        let probe = DiscoveryProbe::with_timeout(Duration::from_millis(200));
        let url = format!("{}{DOC_PATH}", server.uri());
        probe.probe(&url).await
    }

    #[test]
    fn discovery_url_follows_the_cognito_layout() {
        assert_eq!(
            discovery_url("eu-west-1", "eu-west-1_abc"),
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_abc/.well-known/openid-configuration"
        );
    }

    #[tokio::test]
    async fn document_with_issuer_is_ready() {
        let status = probe_with(
            ResponseTemplate::new(200).set_body_json(json!({"issuer": "https://issuer"})),
        )
        .await;
        assert!(matches!(status, PollStatus::Ready(_)), "got {status:?}");
    }

    #[rstest]
    #[case(ResponseTemplate::new(404))]
    #[case(ResponseTemplate::new(503))]
    #[case(ResponseTemplate::new(403))]
    #[case(ResponseTemplate::new(200).set_body_string("<html></html>"))]
    #[case(ResponseTemplate::new(200).set_body_json(json!({"jwks_uri": "https://keys"})))]
    #[tokio::test]
    async fn other_responses_stay_pending(#[case] response: ResponseTemplate) {
        let status = probe_with(response).await;
        assert!(matches!(status, PollStatus::Pending(_)), "got {status:?}");
    }

    #[tokio::test]
    async fn slow_endpoint_counts_as_pending() {
        let status = probe_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"issuer": "https://issuer"}))
                .set_delay(Duration::from_secs(2)),
        )
        .await;
        assert!(matches!(status, PollStatus::Pending(_)), "got {status:?}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_counts_as_pending() {
        let probe = DiscoveryProbe::with_timeout(Duration::from_millis(200));
        let status = probe.probe("http://127.0.0.1:9/missing").await;
        assert!(matches!(status, PollStatus::Pending(_)), "got {status:?}");
    }
}
