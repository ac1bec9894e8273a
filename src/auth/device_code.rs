use std::time::Duration;

use serde::Deserialize;
use strum::{Display, EnumString};
use tokio::time::Instant;

use super::credential::TokenResponse;
use super::error::AuthError;

pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Poll interval used when the provider does not announce one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Raw body of the device-authorization endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    #[serde(default)]
    pub verification_uri: Option<String>,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    #[serde(default)]
    pub interval: Option<u64>,
    pub expires_in: u64,
}

/// Device-code session for one login attempt. Lives in memory only.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use orbyt::auth::DeviceSession;
///
/// let session = DeviceSession::new(
///     "D1",
///     "ABCD-1234",
///     Some("https://idp/device".to_string()),
///     None,
///     Duration::from_secs(5),
///     Duration::from_secs(600),
/// );
/// assert_eq!(session.browser_uri(), "https://idp/device");
/// ```
#[derive(Debug, Clone)]
pub struct DeviceSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: Option<String>,
    pub verification_uri_complete: Option<String>,
    pub interval: Duration,
    pub expires_in: Duration,
    pub issued_at: Instant,
}

impl DeviceSession {
    pub fn new(
        device_code: impl Into<String>,
        user_code: impl Into<String>,
        verification_uri: Option<String>,
        verification_uri_complete: Option<String>,
        interval: Duration,
        expires_in: Duration,
    ) -> Self {
        Self {
            device_code: device_code.into(),
            user_code: user_code.into(),
            verification_uri,
            verification_uri_complete,
            interval,
            expires_in,
            issued_at: Instant::now(),
        }
    }

    /// URI for the human to type; prefers the short form.
    pub fn display_uri(&self) -> &str {
        self.verification_uri
            .as_deref()
            .or(self.verification_uri_complete.as_deref())
            .unwrap_or_default()
    }

    /// URI to open in a browser; prefers the form with the code embedded.
    pub fn browser_uri(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .or(self.verification_uri.as_deref())
            .unwrap_or_default()
    }

    /// Local end of the session, or `None` when the lifetime is past what
    /// the clock can represent.
    pub fn deadline(&self) -> Option<Instant> {
        self.issued_at.checked_add(self.expires_in)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline()
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl TryFrom<DeviceCodeResponse> for DeviceSession {
    type Error = AuthError;

    fn try_from(response: DeviceCodeResponse) -> Result<Self, Self::Error> {
        let no_uri = |uri: &Option<String>| uri.as_deref().map_or(true, str::is_empty);
        if no_uri(&response.verification_uri) && no_uri(&response.verification_uri_complete) {
            return Err(AuthError::InvalidResponse(
                "device authorization response has no verification URI".to_string(),
            ));
        }
        let interval = response
            .interval
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        Ok(Self::new(
            response.device_code,
            response.user_code,
            response.verification_uri.filter(|uri| !uri.is_empty()),
            response.verification_uri_complete.filter(|uri| !uri.is_empty()),
            interval,
            Duration::from_secs(response.expires_in),
        ))
    }
}

/// Error codes the device grant defines for the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceFlowError {
    AuthorizationPending,
    SlowDown,
    AccessDenied,
    ExpiredToken,
}

/// Body of the token endpoint: either a token payload or an OAuth error object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenEndpointResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenEndpointResponse {
    pub fn success(access_token: impl Into<String>, expires_in: Option<u64>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            expires_in,
            ..Self::default()
        }
    }

    pub fn error(code: impl Into<String>) -> Self {
        Self {
            error: Some(code.into()),
            ..Self::default()
        }
    }

    /// The token payload, if any. Takes precedence over an `error` field.
    pub fn token(&self) -> Option<TokenResponse> {
        let access_token = self.access_token.as_ref().filter(|token| !token.is_empty())?;
        Some(TokenResponse {
            access_token: access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            scope: self.scope.clone(),
            token_type: self.token_type.clone(),
            expires_in: self.expires_in,
        })
    }

    /// Recognized device-flow error, or `None` for anything outside the vocabulary.
    pub fn device_flow_error(&self) -> Option<DeviceFlowError> {
        self.error.as_deref()?.parse().ok()
    }
}
