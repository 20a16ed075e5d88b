//! Error types for the AWS control plane.

use serde_json::Value;
use thiserror::Error;

/// Errors raised by the AWS control plane.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AwsError {
    /// Raised when the client cannot be configured.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when no usable credentials are available.
    #[error("failed to load AWS credentials: {0}")]
    Credentials(String),
    /// Raised when request signing fails.
    #[error("failed to sign {operation} request: {message}")]
    Signing {
        /// Operation being signed.
        operation: String,
        /// Signer error message.
        message: String,
    },
    /// Raised when the HTTP exchange itself fails.
    #[error("{operation} request failed: {message}")]
    Transport {
        /// Operation being called.
        operation: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the service rejects a call.
    #[error("{service}.{operation} failed (HTTP {status}): {code} - {message}")]
    Api {
        /// Service that rejected the call.
        service: String,
        /// Operation that was called.
        operation: String,
        /// HTTP status returned.
        status: u16,
        /// Service error code, or `Unknown`.
        code: String,
        /// Service error message.
        message: String,
    },
    /// Raised when a successful response lacks an expected field.
    #[error("unexpected {operation} response: {message}")]
    Response {
        /// Operation whose response was malformed.
        operation: String,
        /// Description of what was missing.
        message: String,
    },
}

impl AwsError {
    /// Builds an [`AwsError::Api`] from a failed response body, reading the
    /// error code from the JSON body or the `x-amzn-errortype` header.
    #[must_use]
    pub fn from_response(
        service: &str,
        operation: &str,
        status: u16,
        error_type_header: Option<&str>,
        body: &str,
    ) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let field = |names: &[&str]| -> Option<String> {
            let json = parsed.as_ref()?;
            names.iter().find_map(|name| {
                json.get(*name)
                    .or_else(|| json.get("Error").and_then(|inner| inner.get(*name)))
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
        };

        let code = field(&["__type", "Code", "code"])
            .or_else(|| error_type_header.map(str::to_owned))
            .map_or_else(|| String::from("Unknown"), |raw| short_code(&raw));
        let message = field(&["message", "Message"]).unwrap_or_else(|| body.trim().to_owned());

        Self::Api {
            service: service.to_owned(),
            operation: operation.to_owned(),
            status,
            code,
            message,
        }
    }

    /// Builds an [`AwsError::Response`] for a missing response field.
    #[must_use]
    pub fn missing_field(operation: &str, field: &str) -> Self {
        Self::Response {
            operation: operation.to_owned(),
            message: format!("missing {field}"),
        }
    }

    /// Returns `true` when the service reported a missing resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { status, code, .. } => *status == 404 || code.contains("NotFound"),
            _ => false,
        }
    }
}

// Codes arrive as `ResourceNotFoundException`, `aws.protocol#ResourceNotFoundException`
// or `ResourceNotFoundException:http://internal.amazon.com/...`.
fn short_code(raw: &str) -> String {
    let without_namespace = raw.rsplit('#').next().unwrap_or(raw);
    without_namespace
        .split(':')
        .next()
        .unwrap_or(without_namespace)
        .to_owned()
}
