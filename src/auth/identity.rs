//! Identity lookup for a bearer credential.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::AuthError;
use super::provider::rejection;
use crate::util::retry::RetryPolicy;

pub const SESSION_PATH: &str = "/api/auth/get-session";

/// The user an access token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Resolves the caller behind an access token.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Fails with [`AuthError::NotFound`] for unknown tokens and
    /// [`AuthError::SessionExpired`] when the provider rejects the token.
    async fn lookup(&self, access_token: &str) -> Result<UserIdentity, AuthError>;
}

/// Looks up the session behind a bearer token over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIdentityLookup {
    client: reqwest::Client,
    session_url: String,
}

impl HttpIdentityLookup {
    pub fn new(server_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            session_url: format!("{}{SESSION_PATH}", server_url.trim_end_matches('/')),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_session_url(mut self, url: impl Into<String>) -> Self {
        self.session_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    #[serde(default)]
    user: Option<UserIdentity>,
}

#[async_trait]
impl IdentityLookup for HttpIdentityLookup {
    async fn lookup(&self, access_token: &str) -> Result<UserIdentity, AuthError> {
        debug!(url = %self.session_url, "resolving identity");
        let resp = self
            .client
            .get(&self.session_url)
            .header("Accept", "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;
        match resp.status() {
            StatusCode::UNAUTHORIZED => return Err(AuthError::SessionExpired),
            StatusCode::NOT_FOUND => return Err(AuthError::NotFound),
            status if !status.is_success() => return Err(rejection(resp).await),
            _ => {}
        }
        // An unknown token yields a literal `null` body.
        let envelope: Option<SessionEnvelope> = resp.json().await?;
        envelope
            .and_then(|envelope| envelope.user)
            .ok_or(AuthError::NotFound)
    }
}

/// Wraps a lookup in bounded retry for transient backend failures.
pub struct RetryingIdentityLookup<L> {
    inner: L,
    policy: RetryPolicy,
}

impl<L: IdentityLookup> RetryingIdentityLookup<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl<L: IdentityLookup> IdentityLookup for RetryingIdentityLookup<L> {
    async fn lookup(&self, access_token: &str) -> Result<UserIdentity, AuthError> {
        self.policy
            .execute(|_| self.inner.lookup(access_token))
            .await
    }
}
