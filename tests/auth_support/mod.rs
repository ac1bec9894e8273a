#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use orbyt::auth::device_code::DeviceCodeResponse;
use orbyt::auth::{
    AuthError, Credential, CredentialStore, DeviceAuthProvider, DeviceSession, IdentityLookup,
    TokenEndpointResponse, TokenResponse, UserIdentity,
};
use tokio::time::Instant;

#[derive(Default)]
pub struct InMemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, credential: Credential) {
        *self.credential.lock().expect("store lock poisoned") = Some(credential);
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self) -> Option<Credential> {
        self.credential.lock().expect("store lock poisoned").clone()
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        *self.credential.lock().expect("store lock poisoned") = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.credential.lock().expect("store lock poisoned") = None;
        Ok(())
    }
}

/// Provider that replays canned token responses and records when each
/// request started.
pub struct ScriptedProvider {
    device: Mutex<Option<DeviceCodeResponse>>,
    responses: Mutex<VecDeque<Result<TokenEndpointResponse, AuthError>>>,
    requests: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<TokenEndpointResponse, AuthError>>) -> Self {
        Self {
            device: Mutex::new(None),
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    pub fn with_device_response(self, response: DeviceCodeResponse) -> Self {
        *self.device.lock().expect("device lock poisoned") = Some(response);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock poisoned").len()
    }

    pub fn gaps(&self) -> Vec<Duration> {
        self.request_times()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceAuthProvider for ScriptedProvider {
    async fn request_device_code(
        &self,
        _client_id: &str,
        _scope: &str,
    ) -> Result<DeviceSession, AuthError> {
        let response = self
            .device
            .lock()
            .expect("device lock poisoned")
            .clone()
            .ok_or_else(|| AuthError::provider("invalid_request", None))?;
        DeviceSession::try_from(response)
    }

    async fn request_token(
        &self,
        _client_id: &str,
        _device_code: &str,
    ) -> Result<TokenEndpointResponse, AuthError> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(Instant::now());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("responses lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::InvalidState("script exhausted".to_string())))
    }
}

#[derive(Default)]
pub struct CountingIdentity {
    calls: AtomicUsize,
}

impl CountingIdentity {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityLookup for CountingIdentity {
    async fn lookup(&self, access_token: &str) -> Result<UserIdentity, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(UserIdentity {
            id: format!("user-for-{access_token}"),
            name: Some("Ada Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            image: None,
        })
    }
}

pub fn pending() -> Result<TokenEndpointResponse, AuthError> {
    Ok(TokenEndpointResponse::error("authorization_pending"))
}

pub fn slow_down() -> Result<TokenEndpointResponse, AuthError> {
    Ok(TokenEndpointResponse::error("slow_down"))
}

pub fn granted(access_token: &str, expires_in: Option<u64>) -> Result<TokenEndpointResponse, AuthError> {
    Ok(TokenEndpointResponse::success(access_token, expires_in))
}

pub fn device_response(interval: Option<u64>, expires_in: u64) -> DeviceCodeResponse {
    DeviceCodeResponse {
        device_code: "D1".to_string(),
        user_code: "ABCD-1234".to_string(),
        verification_uri: Some("https://idp/device".to_string()),
        verification_uri_complete: None,
        interval,
        expires_in,
    }
}

pub fn session(interval_secs: u64, expires_in_secs: u64) -> DeviceSession {
    DeviceSession::new(
        "D1",
        "ABCD-1234",
        Some("https://idp/device".to_string()),
        None,
        Duration::from_secs(interval_secs),
        Duration::from_secs(expires_in_secs),
    )
}

pub fn credential(access_token: &str, expires_in: Option<u64>) -> Credential {
    Credential::from_response(
        TokenResponse {
            access_token: access_token.to_string(),
            refresh_token: None,
            scope: Some("openid profile email".to_string()),
            token_type: None,
            expires_in,
        },
        Utc::now(),
    )
}
