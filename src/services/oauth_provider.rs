//! OAuth2 token endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::oauth::{AppOAuthCredentials, TokenBundle};

/// HTTP connect timeout for token endpoint calls.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// HTTP total timeout for token endpoint calls.
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a token request failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider refused the grant; the user must authorize again
    #[error("grant rejected: {0}")]
    Rejected(String),

    /// Network failure, server error or an unreadable response
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected(msg) => AppError::AuthRequired(msg),
            ProviderError::Transport(msg) => AppError::Upstream(msg),
        }
    }
}

/// Token endpoint operations.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Exchange an authorization code for tokens.
    async fn exchange_code(
        &self,
        credentials: &AppOAuthCredentials,
        code: &SecretString,
        redirect_uri: &str,
    ) -> Result<TokenBundle, ProviderError>;

    /// Use a refresh token to obtain a new access token.
    async fn refresh(
        &self,
        credentials: &AppOAuthCredentials,
        refresh_token: &SecretString,
    ) -> Result<TokenBundle, ProviderError>;
}

/// Provider speaking the standard form-encoded token endpoint protocol.
#[derive(Clone)]
pub struct HttpOAuthProvider {
    client: reqwest::Client,
    token_uri: String,
}

impl HttpOAuthProvider {
    pub fn new(token_uri: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to build OAuth HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            token_uri: token_uri.into(),
        })
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> Result<TokenBundle, ProviderError> {
        let body = encode_form(params);

        let response = self
            .client
            .post(&self.token_uri)
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!("OAuth: token endpoint unreachable: {}", e);
                ProviderError::Transport(format!("token endpoint unreachable: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            warn!("OAuth: failed to read token response: {}", e);
            ProviderError::Transport(format!("failed to read token response: {}", e))
        })?;
        let payload: Option<Value> = serde_json::from_str(&text).ok();

        if status.is_success() {
            let payload = payload.ok_or_else(|| {
                ProviderError::Transport("token response is not JSON".to_string())
            })?;
            debug!(status = %status.as_u16(), "OAuth: token endpoint succeeded");
            return TokenBundle::from_response(payload).map_err(ProviderError::Transport);
        }

        let error_code = payload
            .as_ref()
            .and_then(|v| v.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        warn!(
            status = %status.as_u16(),
            error = %error_code,
            "OAuth: token endpoint returned an error"
        );
        Err(classify_failure(status.as_u16(), &error_code))
    }
}

/// Map a failed token endpoint response to a provider error.
fn classify_failure(status: u16, error_code: &str) -> ProviderError {
    let rejected = matches!(
        error_code,
        "invalid_grant" | "invalid_client" | "unauthorized_client"
    ) || matches!(status, 400 | 401);

    if rejected && status < 500 {
        let reason = if error_code.is_empty() {
            format!("HTTP {}", status)
        } else {
            error_code.to_string()
        };
        ProviderError::Rejected(reason)
    } else {
        ProviderError::Transport(format!("token endpoint returned HTTP {}", status))
    }
}

/// Encode key/value pairs as `application/x-www-form-urlencoded`.
fn encode_form(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[async_trait]
impl OAuthProvider for HttpOAuthProvider {
    async fn exchange_code(
        &self,
        credentials: &AppOAuthCredentials,
        code: &SecretString,
        redirect_uri: &str,
    ) -> Result<TokenBundle, ProviderError> {
        self.post_form(&[
            ("grant_type", "authorization_code"),
            ("code", code.expose_secret()),
            ("redirect_uri", redirect_uri),
            ("client_id", &credentials.client_id),
            ("client_secret", credentials.client_secret.expose_secret()),
        ])
        .await
    }

    async fn refresh(
        &self,
        credentials: &AppOAuthCredentials,
        refresh_token: &SecretString,
    ) -> Result<TokenBundle, ProviderError> {
        self.post_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
            ("client_id", &credentials.client_id),
            ("client_secret", credentials.client_secret.expose_secret()),
        ])
        .await
    }
}
