use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Token payload returned by the provider once the device grant succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds, relative to the moment of issue.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// The single credential persisted for the current host user.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use orbyt::auth::{Credential, TokenResponse};
///
/// let response = TokenResponse {
///     access_token: "tok_abc".to_string(),
///     refresh_token: None,
///     scope: Some("openid profile".to_string()),
///     token_type: None,
///     expires_in: Some(3600),
/// };
/// let credential = Credential::from_response(response, Utc::now());
/// assert_eq!(credential.token_type, "Bearer");
/// assert!(credential.expires_at.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// Build the persisted record, anchoring the relative lifetime at `now`.
    ///
    /// A lifetime too large to represent as a timestamp is stored as no expiry.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = response
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            scope: response.scope,
            token_type: response
                .token_type
                .filter(|kind| !kind.trim().is_empty())
                .unwrap_or_else(default_token_type),
            expires_at,
            created_at: now,
        }
    }

    /// Time left until `expires_at`, negative once past.
    ///
    /// `None` means the provider never declared a lifetime.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at.map(|expires_at| expires_at - now)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or_default().split_whitespace()
    }

    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}
