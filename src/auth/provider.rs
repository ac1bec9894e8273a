//! Transport to the identity provider's device-authorization endpoints.

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use tracing::debug;

use super::device_code::{
    DeviceCodeResponse, DeviceSession, TokenEndpointResponse, DEVICE_CODE_GRANT_TYPE,
};
use super::error::AuthError;

pub const DEVICE_CODE_PATH: &str = "/api/auth/device/code";
pub const DEVICE_TOKEN_PATH: &str = "/api/auth/device/token";

/// The two provider calls the device grant needs.
#[async_trait]
pub trait DeviceAuthProvider: Send + Sync {
    /// Ask for a device/user code pair.
    async fn request_device_code(
        &self,
        client_id: &str,
        scope: &str,
    ) -> Result<DeviceSession, AuthError>;

    /// One token-endpoint round trip. OAuth error bodies come back as `Ok`;
    /// only transport or undecodable responses are `Err`.
    async fn request_token(
        &self,
        client_id: &str,
        device_code: &str,
    ) -> Result<TokenEndpointResponse, AuthError>;
}

/// reqwest-backed provider client.
///
/// # Example
/// ```no_run
/// use orbyt::auth::HttpDeviceAuthProvider;
///
/// let provider = HttpDeviceAuthProvider::new("http://localhost:3005");
/// ```
#[derive(Debug, Clone)]
pub struct HttpDeviceAuthProvider {
    client: reqwest::Client,
    device_code_url: String,
    token_url: String,
}

impl HttpDeviceAuthProvider {
    pub fn new(server_url: &str) -> Self {
        let base = server_url.trim_end_matches('/');
        Self {
            client: reqwest::Client::new(),
            device_code_url: format!("{base}{DEVICE_CODE_PATH}"),
            token_url: format!("{base}{DEVICE_TOKEN_PATH}"),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_device_code_url(mut self, url: impl Into<String>) -> Self {
        self.device_code_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

#[async_trait]
impl DeviceAuthProvider for HttpDeviceAuthProvider {
    async fn request_device_code(
        &self,
        client_id: &str,
        scope: &str,
    ) -> Result<DeviceSession, AuthError> {
        debug!(url = %self.device_code_url, "requesting device authorization");
        let resp = self
            .client
            .post(&self.device_code_url)
            .header("Accept", "application/json")
            .form(&[("client_id", client_id), ("scope", scope)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        let payload: DeviceCodeResponse = resp.json().await?;
        DeviceSession::try_from(payload)
    }

    async fn request_token(
        &self,
        client_id: &str,
        device_code: &str,
    ) -> Result<TokenEndpointResponse, AuthError> {
        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", DEVICE_CODE_GRANT_TYPE),
                ("device_code", device_code),
                ("client_id", client_id),
            ])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        match serde_json::from_str::<TokenEndpointResponse>(&body) {
            Ok(payload) if payload.access_token.is_some() || payload.error.is_some() => {
                Ok(payload)
            }
            // Device-flow errors arrive as 400s, so the status alone decides nothing.
            _ if !status.is_success() => Err(AuthError::provider(
                status.as_u16().to_string(),
                non_empty(body),
            )),
            Ok(_) => Err(AuthError::InvalidResponse(
                "token response has neither access_token nor error".to_string(),
            )),
            Err(err) => Err(AuthError::InvalidResponse(format!(
                "token response is not JSON: {err}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Turn a non-2xx response into a provider error, keeping the OAuth code when present.
pub(crate) async fn rejection(resp: Response) -> AuthError {
    let status = resp.status();
    let body = match resp.text().await {
        Ok(body) => body,
        Err(err) => return AuthError::from(err),
    };
    match serde_json::from_str::<OAuthErrorBody>(&body) {
        Ok(oauth) => AuthError::provider(oauth.error, oauth.error_description),
        Err(_) => AuthError::provider(status.as_u16().to_string(), non_empty(body)),
    }
}

fn non_empty(body: String) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
