//! OAuth2 client-credentials token acquisition.
//!
//! Tokens are fetched explicitly before an authenticated client is built and
//! kept in a [`TokenCache`] keyed by credential-provider name, so repeated
//! invocations reuse a live token instead of hitting the token endpoint.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

use crate::checkpoint::CognitoRecord;

/// Tokens closer than this to expiry are refreshed.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Longest lifetime honoured for a token; Cognito issues at most one day.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors raised while acquiring an access token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token endpoint could not be reached.
    #[error("token request to {endpoint} failed: {message}")]
    Request {
        /// Token endpoint URL.
        endpoint: String,
        /// Transport error.
        message: String,
    },
    /// The token endpoint rejected the request.
    #[error("token endpoint returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The response was not a token document.
    #[error("malformed token response: {0}")]
    Response(String),
}

/// Bearer token with an absolute expiry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccessToken {
    value: String,
    token_type: String,
    expires_at: Instant,
}

impl AccessToken {
    /// Creates a token that expires `expires_in` from now, capped at
    /// [`MAX_TOKEN_LIFETIME`].
    #[must_use]
    pub fn new(value: impl Into<String>, token_type: impl Into<String>, expires_in: Duration) -> Self {
        let now = Instant::now();
        let lifetime = expires_in.min(MAX_TOKEN_LIFETIME);
        Self {
            value: value.into(),
            token_type: token_type.into(),
            expires_at: now.checked_add(lifetime).unwrap_or(now),
        }
    }

    /// Raw token value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Token type reported by the endpoint, usually `Bearer`.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Instant after which the token is no longer valid.
    #[must_use]
    pub const fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Returns `true` when the token stays valid for at least `margin`.
    #[must_use]
    pub fn is_fresh(&self, margin: Duration) -> bool {
        Instant::now()
            .checked_add(margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }

    /// Value for an `Authorization` header.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

/// Future returned by a token source.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessToken, TokenError>> + Send + 'a>>;

/// Something that can mint access tokens.
pub trait TokenSource {
    /// Fetches a new token.
    fn fetch_token(&self) -> TokenFuture<'_>;
}

/// Client-credentials grant inputs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientCredentials {
    /// App client identifier.
    pub client_id: String,
    /// App client secret.
    pub client_secret: String,
    /// Token endpoint URL.
    pub token_endpoint: String,
    /// Scope to request.
    pub scope: String,
}

impl From<&CognitoRecord> for ClientCredentials {
    fn from(record: &CognitoRecord) -> Self {
        Self {
            client_id: record.client_id.clone(),
            client_secret: record.client_secret.clone(),
            token_endpoint: record.token_endpoint.clone(),
            scope: record.scope.clone(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Token source backed by a Cognito hosted-domain token endpoint.
#[derive(Clone, Debug)]
pub struct CognitoTokenClient {
    http: Client,
    credentials: ClientCredentials,
}

impl CognitoTokenClient {
    /// Creates a client for the given credentials.
    #[must_use]
    pub fn new(credentials: ClientCredentials) -> Self {
        Self {
            http: Client::new(),
            credentials,
        }
    }

    async fn request_token(&self) -> Result<AccessToken, TokenError> {
        let endpoint = &self.credentials.token_endpoint;
        let response = self
            .http
            .post(endpoint)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.credentials.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|err| TokenError::Request {
                endpoint: endpoint.clone(),
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| TokenError::Request {
            endpoint: endpoint.clone(),
            message: err.to_string(),
        })?;
        if !status.is_success() {
            return Err(TokenError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|err| TokenError::Response(err.to_string()))?;
        Ok(AccessToken::new(
            parsed.access_token,
            parsed.token_type.unwrap_or_else(|| String::from("Bearer")),
            Duration::from_secs(parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN)),
        ))
    }
}

impl TokenSource for CognitoTokenClient {
    fn fetch_token(&self) -> TokenFuture<'_> {
        Box::pin(self.request_token())
    }
}

/// In-memory token holder keyed by credential-provider name.
#[derive(Debug)]
pub struct TokenCache {
    tokens: Mutex<HashMap<String, AccessToken>>,
    refresh_margin: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(REFRESH_MARGIN)
    }
}

impl TokenCache {
    /// Creates an empty cache that refreshes tokens `refresh_margin` early.
    #[must_use]
    pub fn new(refresh_margin: Duration) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            refresh_margin,
        }
    }

    /// Returns the cached token for `provider`, fetching a new one from
    /// `source` when none is cached or it is about to expire.
    ///
    /// # Errors
    ///
    /// Propagates [`TokenError`] from `source`.
    pub async fn token<T>(&self, provider: &str, source: &T) -> Result<AccessToken, TokenError>
    where
        T: TokenSource + ?Sized,
    {
        let mut tokens = self.tokens.lock().await;
        if let Some(token) = tokens.get(provider) {
            if token.is_fresh(self.refresh_margin) {
                return Ok(token.clone());
            }
        }

        info!("⏳ Fetching access token for {provider}");
        let token = source.fetch_token().await?;
        tokens.insert(provider.to_owned(), token.clone());
        Ok(token)
    }

    /// Drops the cached token for `provider`.
    pub async fn invalidate(&self, provider: &str) {
        self.tokens.lock().await.remove(provider);
    }
}
