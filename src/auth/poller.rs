//! Token-endpoint polling for the device grant.
//!
//! [`TokenPoller`] issues one request per tick, never overlapping, and waits
//! the current interval between ticks. Each tick is classified into a
//! [`TokenPoll`]; `authorization_pending` is an ordinary state, not an error.

use std::time::Duration;

use bon::Builder;
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::credential::TokenResponse;
use super::device_code::{
    DeviceFlowError, DeviceSession, TokenEndpointResponse, DEFAULT_POLL_INTERVAL,
};
use super::error::AuthError;
use super::provider::DeviceAuthProvider;

/// Added to the interval on every `slow_down`. Cumulative.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Fixed polling policy.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use orbyt::auth::PollPolicy;
///
/// let policy = PollPolicy::builder()
///     .slow_down_increment(Duration::from_secs(10))
///     .build();
/// assert_eq!(policy.default_interval, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Builder)]
pub struct PollPolicy {
    /// Used when the session carries a zero interval.
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub default_interval: Duration,
    #[builder(default = SLOW_DOWN_INCREMENT)]
    pub slow_down_increment: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Where the poller stands after its latest tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PollState {
    Pending,
    SlowedDown,
    Succeeded,
    Denied,
    Expired,
    Failed,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::SlowedDown)
    }
}

/// Outcome of a single tick.
#[derive(Debug)]
pub enum TokenPoll {
    Pending,
    SlowDown,
    Success(TokenResponse),
    Denied,
    Expired,
    Failed(AuthError),
}

impl TokenPoll {
    /// Classify a token-endpoint body. A token payload beats any `error` field.
    pub fn classify(response: TokenEndpointResponse) -> Self {
        if let Some(token) = response.token() {
            return Self::Success(token);
        }
        match response.device_flow_error() {
            Some(DeviceFlowError::AuthorizationPending) => Self::Pending,
            Some(DeviceFlowError::SlowDown) => Self::SlowDown,
            Some(DeviceFlowError::AccessDenied) => Self::Denied,
            Some(DeviceFlowError::ExpiredToken) => Self::Expired,
            None => match response.error {
                Some(code) => Self::Failed(AuthError::provider(code, response.error_description)),
                None => Self::Failed(AuthError::InvalidResponse(
                    "token response has neither access_token nor error".to_string(),
                )),
            },
        }
    }

    pub fn state(&self) -> PollState {
        match self {
            Self::Pending => PollState::Pending,
            Self::SlowDown => PollState::SlowedDown,
            Self::Success(_) => PollState::Succeeded,
            Self::Denied => PollState::Denied,
            Self::Expired => PollState::Expired,
            Self::Failed(_) => PollState::Failed,
        }
    }
}

/// Snapshot handed to the presentation layer after every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollProgress {
    pub attempt: u32,
    pub state: PollState,
    pub interval: Duration,
}

impl PollProgress {
    pub fn message(&self) -> String {
        match self.state {
            PollState::Pending => format!(
                "Polling for authorization (attempt {}, every {}s)",
                self.attempt,
                self.interval.as_secs()
            ),
            PollState::SlowedDown => format!(
                "Provider asked to slow down, polling every {}s",
                self.interval.as_secs()
            ),
            PollState::Succeeded => "Authorization granted".to_string(),
            PollState::Denied => "Authorization denied".to_string(),
            PollState::Expired => "Device code expired".to_string(),
            PollState::Failed => "Polling failed".to_string(),
        }
    }
}

/// Drives one [`DeviceSession`] to a token or a terminal failure.
pub struct TokenPoller<'a> {
    provider: &'a dyn DeviceAuthProvider,
    session: &'a DeviceSession,
    client_id: &'a str,
    policy: PollPolicy,
    interval: Duration,
    state: PollState,
    attempts: u32,
}

impl<'a> TokenPoller<'a> {
    pub fn new(
        provider: &'a dyn DeviceAuthProvider,
        session: &'a DeviceSession,
        client_id: &'a str,
    ) -> Self {
        Self::with_policy(provider, session, client_id, PollPolicy::default())
    }

    pub fn with_policy(
        provider: &'a dyn DeviceAuthProvider,
        session: &'a DeviceSession,
        client_id: &'a str,
        policy: PollPolicy,
    ) -> Self {
        let interval = if session.interval.is_zero() {
            policy.default_interval
        } else {
            session.interval
        };
        Self {
            provider,
            session,
            client_id,
            policy,
            interval,
            state: PollState::Pending,
            attempts: 0,
        }
    }

    /// Current delay between ticks, including every `slow_down` bump so far.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Token requests issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn progress(&self) -> PollProgress {
        PollProgress {
            attempt: self.attempts,
            state: self.state,
            interval: self.interval,
        }
    }

    /// Issue one token request and fold its outcome into the state machine.
    ///
    /// No request is sent once the poller is terminal or the session's
    /// lifetime has elapsed locally.
    pub async fn tick(&mut self) -> TokenPoll {
        if self.state.is_terminal() {
            return TokenPoll::Failed(AuthError::InvalidState(format!(
                "device session already finished ({})",
                self.state
            )));
        }
        if self.session.is_expired() {
            debug!(attempts = self.attempts, "device session lifetime elapsed");
            self.state = PollState::Expired;
            return TokenPoll::Expired;
        }

        self.attempts += 1;
        let outcome = match self
            .provider
            .request_token(self.client_id, &self.session.device_code)
            .await
        {
            Ok(response) => TokenPoll::classify(response),
            Err(err) => TokenPoll::Failed(err),
        };

        match &outcome {
            TokenPoll::Pending => {
                debug!(attempt = self.attempts, "authorization pending");
            }
            TokenPoll::SlowDown => {
                self.interval = self.interval.saturating_add(self.policy.slow_down_increment);
                debug!(
                    attempt = self.attempts,
                    interval_secs = self.interval.as_secs(),
                    "provider requested slow_down"
                );
            }
            TokenPoll::Success(_) => info!(attempt = self.attempts, "device authorization granted"),
            TokenPoll::Denied => info!(attempt = self.attempts, "device authorization denied"),
            TokenPoll::Expired => info!(attempt = self.attempts, "device code expired"),
            TokenPoll::Failed(err) => {
                warn!(attempt = self.attempts, error = %err, "token polling failed")
            }
        }
        self.state = outcome.state();
        outcome
    }

    /// Poll until success or a terminal failure.
    ///
    /// The first request goes out immediately; later ones wait the current
    /// interval after the previous response. Cancelling `cancel` stops the
    /// loop without issuing another request.
    pub async fn run<F>(
        &mut self,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<TokenResponse, AuthError>
    where
        F: FnMut(&PollProgress),
    {
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                outcome = self.tick() => outcome,
            };
            on_progress(&self.progress());

            match outcome {
                TokenPoll::Success(token) => return Ok(token),
                TokenPoll::Pending | TokenPoll::SlowDown => {}
                TokenPoll::Denied => return Err(AuthError::AuthorizationDenied),
                TokenPoll::Expired => return Err(AuthError::DeviceCodeExpired),
                TokenPoll::Failed(err) => return Err(err),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(attempts = self.attempts, "polling cancelled");
                    return Err(AuthError::Cancelled);
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
