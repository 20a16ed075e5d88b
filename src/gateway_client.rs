//! Authenticated MCP calls through the provisioned gateway.

use std::collections::HashSet;

use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;

use crate::control::TOOL_NAME;
use crate::stream::parse_sse_line;
use crate::token::AccessToken;

/// Errors raised while talking to the gateway's MCP endpoint.
#[derive(Debug, Error)]
pub enum GatewayClientError {
    /// The request could not be sent.
    #[error("gateway request failed: {0}")]
    Request(String),
    /// The gateway answered with a non-success status.
    #[error("gateway returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The gateway answered with a JSON-RPC error.
    #[error("gateway error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },
    /// The response could not be decoded.
    #[error("malformed gateway response: {0}")]
    Response(String),
    /// The tool ran but reported a failure.
    #[error("tool {name} reported an error: {message}")]
    Tool {
        /// Tool that failed.
        name: String,
        /// Text returned with the failure.
        message: String,
    },
    /// The gateway repeated a pagination cursor.
    #[error("gateway repeated pagination cursor {0}")]
    CursorLoop(String),
}

/// Tool advertised by the gateway.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Tool name, prefixed with the target name by the gateway.
    pub name: String,
    /// Human readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// JSON schema of the tool input.
    #[serde(default)]
    pub input_schema: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsPage {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallResult {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    is_error: bool,
}

impl ToolCallResult {
    // Non-text blocks (images, resources) are skipped.
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// JSON-RPC client for a gateway's MCP endpoint.
#[derive(Clone, Debug)]
pub struct GatewayClient {
    http: Client,
    url: String,
}

impl GatewayClient {
    /// Creates a client for the gateway MCP URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }

    /// Lists every tool exposed by the gateway, following pagination.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayClientError`] when a request fails, the gateway
    /// reports an error, or a pagination cursor repeats.
    pub async fn list_tools(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<ToolDescriptor>, GatewayClientError> {
        let mut tools = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut request_id = 0_u64;

        loop {
            request_id = request_id.saturating_add(1);
            let params = cursor
                .as_ref()
                .map_or_else(|| json!({}), |next| json!({ "cursor": next }));
            let result = self
                .call(token, request_id, "tools/list", params)
                .await?;
            let page: ToolsPage = serde_json::from_value(result)
                .map_err(|err| GatewayClientError::Response(err.to_string()))?;
            tools.extend(page.tools);

            match page.next_cursor.filter(|next| !next.is_empty()) {
                Some(next) if !seen.insert(next.clone()) => {
                    return Err(GatewayClientError::CursorLoop(next));
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!("✅ Gateway lists {} tool(s)", tools.len());
        Ok(tools)
    }

    /// Invokes `name` with `arguments` and returns the text content of the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayClientError::Tool`] when the tool reports
    /// `isError`, and the other variants when the call itself fails.
    pub async fn call_tool(
        &self,
        token: &AccessToken,
        name: &str,
        arguments: Value,
    ) -> Result<String, GatewayClientError> {
        info!("⏳ Calling {name} through the gateway");
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.call(token, 1, "tools/call", params).await?;
        let outcome: ToolCallResult = serde_json::from_value(result)
            .map_err(|err| GatewayClientError::Response(err.to_string()))?;
        let text = outcome.text();
        if outcome.is_error {
            return Err(GatewayClientError::Tool {
                name: name.to_owned(),
                message: text,
            });
        }
        info!("✅ {name} answered");
        Ok(text)
    }

    async fn call(
        &self,
        token: &AccessToken,
        id: u64,
        method: &str,
        params: Value,
    ) -> Result<Value, GatewayClientError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, token.authorization())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|err| GatewayClientError::Request(err.to_string()))?;

        let status = response.status();
        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));
        let text = response
            .text()
            .await
            .map_err(|err| GatewayClientError::Request(err.to_string()))?;
        if !status.is_success() {
            return Err(GatewayClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload = if is_event_stream {
            last_event_payload(&text)?
        } else {
            text.as_str()
        };
        let decoded: RpcResponse = serde_json::from_str(payload)
            .map_err(|err| GatewayClientError::Response(err.to_string()))?;
        if let Some(error) = decoded.error {
            return Err(GatewayClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        decoded
            .result
            .ok_or_else(|| GatewayClientError::Response(String::from("missing result")))
    }
}

fn last_event_payload(body: &str) -> Result<&str, GatewayClientError> {
    body.lines()
        .filter_map(parse_sse_line)
        .filter(|payload| !payload.trim().is_empty())
        .next_back()
        .ok_or_else(|| GatewayClientError::Response(String::from("event stream carried no data")))
}

/// Finds the cost estimation tool, which the gateway prefixes with the
/// target name (`<target>___aws_cost_estimation`).
#[must_use]
pub fn find_tool(tools: &[ToolDescriptor]) -> Option<&ToolDescriptor> {
    let suffix = format!("___{TOOL_NAME}");
    tools
        .iter()
        .find(|tool| tool.name == TOOL_NAME || tool.name.ends_with(&suffix))
}
