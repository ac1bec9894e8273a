use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::credential::Credential;
use super::error::AuthError;
use super::store::CredentialStore;

/// Re-authentication is forced this long before the provider-declared expiry.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::minutes(5);

/// Whether `credential` needs re-authentication within `margin` of `now`.
///
/// A missing credential counts as expiring. A credential whose provider never
/// declared a lifetime does not.
pub fn is_expiring_soon(
    credential: Option<&Credential>,
    margin: Duration,
    now: DateTime<Utc>,
) -> bool {
    match credential {
        None => true,
        Some(credential) => credential
            .expires_in(now)
            .is_some_and(|remaining| remaining < margin),
    }
}

/// Gatekeeper in front of protected calls.
pub struct SessionValidator {
    store: Arc<dyn CredentialStore>,
    margin: Duration,
}

impl SessionValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            margin: DEFAULT_EXPIRY_MARGIN,
        }
    }

    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    pub fn is_expiring_soon(&self, credential: Option<&Credential>) -> bool {
        is_expiring_soon(credential, self.margin, Utc::now())
    }

    /// Stored credential, provided it stays valid beyond the margin.
    pub fn require_valid(&self) -> Result<Credential, AuthError> {
        let credential = self.store.load().ok_or(AuthError::NotAuthenticated)?;
        if self.is_expiring_soon(Some(&credential)) {
            return Err(AuthError::SessionExpired);
        }
        Ok(credential)
    }
}
