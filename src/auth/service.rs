use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::credential::{Credential, TokenResponse};
use super::device_code::DeviceSession;
use super::error::AuthError;
use super::identity::{HttpIdentityLookup, IdentityLookup, RetryingIdentityLookup, UserIdentity};
use super::poller::{PollPolicy, PollProgress, TokenPoller};
use super::provider::{DeviceAuthProvider, HttpDeviceAuthProvider};
use super::session::SessionValidator;
use super::store::{CredentialStore, FileCredentialStore};
use crate::config::OrbytConfig;
use crate::error::OrbytError;

/// What the stored credential allows right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    LoggedOut,
    /// Usable; `expires_in` is `None` when the provider declared no lifetime.
    Active {
        credential: Credential,
        expires_in: Option<Duration>,
    },
    /// Present but inside the expiry margin.
    ExpiringSoon { credential: Credential },
}

/// Result of a completed grant.
///
/// Persistence failure does not undo the login: the credential is still
/// returned and `storage_error` explains why it was not saved.
#[derive(Debug)]
pub struct LoginOutcome {
    pub credential: Credential,
    pub storage_error: Option<AuthError>,
}

impl LoginOutcome {
    pub fn persisted(&self) -> bool {
        self.storage_error.is_none()
    }
}

/// Pure service facade for the login, logout, and whoami flows.
///
/// All I/O decisions (printing, prompting, exit codes) belong to the caller.
/// `AuthService` only returns typed results and errors.
///
/// # Example
/// ```no_run
/// use orbyt::auth::AuthService;
/// use orbyt::config::OrbytConfig;
///
/// let config = OrbytConfig::load()?;
/// let service = AuthService::from_config(&config)?;
/// # Ok::<(), orbyt::error::OrbytError>(())
/// ```
pub struct AuthService {
    provider: Arc<dyn DeviceAuthProvider>,
    store: Arc<dyn CredentialStore>,
    identity: Arc<dyn IdentityLookup>,
    validator: SessionValidator,
    client_id: String,
    scope: String,
    poll_policy: PollPolicy,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn DeviceAuthProvider>,
        store: Arc<dyn CredentialStore>,
        identity: Arc<dyn IdentityLookup>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            validator: SessionValidator::new(store.clone()),
            store,
            identity,
            client_id: client_id.into(),
            scope: crate::config::DEFAULT_SCOPE.to_string(),
            poll_policy: PollPolicy::default(),
        }
    }

    /// Wire the HTTP provider, file store, and retrying identity lookup.
    ///
    /// A missing client id is allowed here; [`AuthService::start_login`]
    /// rejects it, while logout and whoami work without one.
    pub fn from_config(config: &OrbytConfig) -> Result<Self, OrbytError> {
        let server_url = config.server_url()?;
        let provider = HttpDeviceAuthProvider::new(server_url.as_str());
        let identity = RetryingIdentityLookup::new(HttpIdentityLookup::new(server_url.as_str()));
        let store = FileCredentialStore::new(config.credential_path());
        Ok(Self::new(
            Arc::new(provider),
            Arc::new(store),
            Arc::new(identity),
            config.client_id.clone().unwrap_or_default(),
        )
        .with_scope(config.scope.clone()))
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.validator = SessionValidator::new(self.store.clone()).with_margin(margin);
        self
    }

    pub fn status(&self) -> SessionStatus {
        match self.store.load() {
            None => SessionStatus::LoggedOut,
            Some(credential) if self.validator.is_expiring_soon(Some(&credential)) => {
                SessionStatus::ExpiringSoon { credential }
            }
            Some(credential) => SessionStatus::Active {
                expires_in: credential.expires_in(Utc::now()),
                credential,
            },
        }
    }

    /// Request a fresh device/user code pair.
    pub async fn start_login(&self) -> Result<DeviceSession, AuthError> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::provider(
                "invalid_client",
                Some("no client id configured".to_string()),
            ));
        }
        let session = self
            .provider
            .request_device_code(&self.client_id, &self.scope)
            .await?;
        info!(
            interval_secs = session.interval.as_secs(),
            expires_in_secs = session.expires_in.as_secs(),
            "device authorization started"
        );
        Ok(session)
    }

    pub fn poller<'a>(&'a self, session: &'a DeviceSession) -> TokenPoller<'a> {
        TokenPoller::with_policy(
            self.provider.as_ref(),
            session,
            &self.client_id,
            self.poll_policy.clone(),
        )
    }

    /// Poll `session` to completion and persist the resulting credential.
    pub async fn complete_login<F>(
        &self,
        session: &DeviceSession,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<LoginOutcome, AuthError>
    where
        F: FnMut(&PollProgress),
    {
        let token = self.poller(session).run(cancel, on_progress).await?;
        Ok(self.store_token(token))
    }

    /// Persist a granted token, reporting rather than propagating storage errors.
    pub fn store_token(&self, token: TokenResponse) -> LoginOutcome {
        let credential = Credential::from_response(token, Utc::now());
        let storage_error = match self.store.save(&credential) {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, "could not persist credential");
                Some(err)
            }
        };
        LoginOutcome {
            credential,
            storage_error,
        }
    }

    /// Remove the stored credential. Returns whether one was present.
    pub fn logout(&self) -> Result<bool, AuthError> {
        let present = self.store.load().is_some();
        self.store.clear()?;
        Ok(present)
    }

    /// Resolve the identity behind the stored credential.
    ///
    /// No identity request is made unless the credential is present and valid.
    pub async fn whoami(&self) -> Result<UserIdentity, AuthError> {
        let credential = self.validator.require_valid()?;
        self.identity.lookup(&credential.access_token).await
    }

    pub fn validator(&self) -> &SessionValidator {
        &self.validator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    use crate::auth::device_code::TokenEndpointResponse;

    struct UnreachableProvider;

    #[async_trait]
    impl DeviceAuthProvider for UnreachableProvider {
        async fn request_device_code(
            &self,
            _client_id: &str,
            _scope: &str,
        ) -> Result<DeviceSession, AuthError> {
            Err(AuthError::Network("unreachable".to_string()))
        }

        async fn request_token(
            &self,
            _client_id: &str,
            _device_code: &str,
        ) -> Result<TokenEndpointResponse, AuthError> {
            Err(AuthError::Network("unreachable".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingIdentity {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityLookup for CountingIdentity {
        async fn lookup(&self, _access_token: &str) -> Result<UserIdentity, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(UserIdentity {
                id: "u1".to_string(),
                name: Some("Ada".to_string()),
                email: Some("ada@example.com".to_string()),
                image: None,
            })
        }
    }

    fn temp_service(identity: Arc<CountingIdentity>) -> (TempDir, AuthService) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileCredentialStore::in_dir(dir.path()));
        let svc = AuthService::new(Arc::new(UnreachableProvider), store, identity, "cli");
        (dir, svc)
    }

    fn token(expires_in: Option<u64>) -> TokenResponse {
        TokenResponse {
            access_token: "tok_abc".to_string(),
            refresh_token: None,
            scope: None,
            token_type: None,
            expires_in,
        }
    }

    #[test]
    fn status_is_logged_out_without_credential() {
        let (_dir, svc) = temp_service(Arc::default());
        assert_eq!(svc.status(), SessionStatus::LoggedOut);
    }

    #[test]
    fn status_reports_expiring_credential() {
        let (_dir, svc) = temp_service(Arc::default());
        svc.store_token(token(Some(60)));
        assert!(matches!(svc.status(), SessionStatus::ExpiringSoon { .. }));
    }

    #[test]
    fn status_reports_active_credential() {
        let (_dir, svc) = temp_service(Arc::default());
        svc.store_token(token(None));
        assert!(matches!(
            svc.status(),
            SessionStatus::Active {
                expires_in: None,
                ..
            }
        ));
    }

    #[test]
    fn logout_reports_whether_anything_was_stored() {
        let (_dir, svc) = temp_service(Arc::default());
        assert!(!svc.logout().unwrap());
        svc.store_token(token(None));
        assert!(svc.logout().unwrap());
        assert_eq!(svc.status(), SessionStatus::LoggedOut);
    }

    #[test]
    fn storage_failure_keeps_login_outcome() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail.
        let blocked = dir.path().join("token.json");
        std::fs::create_dir_all(blocked.join("occupied")).unwrap();
        let svc = AuthService::new(
            Arc::new(UnreachableProvider),
            Arc::new(FileCredentialStore::new(&blocked)),
            Arc::new(CountingIdentity::default()),
            "cli",
        );
        let outcome = svc.store_token(token(Some(3600)));
        assert!(!outcome.persisted());
        assert_eq!(outcome.credential.access_token, "tok_abc");
    }

    #[test]
    fn huge_provider_lifetime_still_completes_login() {
        let (_dir, svc) = temp_service(Arc::default());
        let outcome = svc.store_token(token(Some(10_000_000_000_000)));
        assert!(outcome.persisted());
        assert!(outcome.credential.expires_at.is_none());
        assert!(matches!(
            svc.status(),
            SessionStatus::Active {
                expires_in: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn whoami_without_credential_skips_identity_lookup() {
        let identity = Arc::new(CountingIdentity::default());
        let (_dir, svc) = temp_service(identity.clone());
        assert!(matches!(
            svc.whoami().await,
            Err(AuthError::NotAuthenticated)
        ));
        assert_eq!(identity.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn whoami_with_expiring_credential_skips_identity_lookup() {
        let identity = Arc::new(CountingIdentity::default());
        let (_dir, svc) = temp_service(identity.clone());
        svc.store_token(token(Some(120)));
        assert!(matches!(svc.whoami().await, Err(AuthError::SessionExpired)));
        assert_eq!(identity.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn whoami_resolves_identity_for_valid_credential() {
        let identity = Arc::new(CountingIdentity::default());
        let (_dir, svc) = temp_service(identity.clone());
        svc.store_token(token(Some(3600)));
        let user = svc.whoami().await.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_login_requires_client_id() {
        let dir = TempDir::new().unwrap();
        let svc = AuthService::new(
            Arc::new(UnreachableProvider),
            Arc::new(FileCredentialStore::in_dir(dir.path())),
            Arc::new(CountingIdentity::default()),
            "",
        );
        assert!(matches!(
            svc.start_login().await,
            Err(AuthError::Provider { code, .. }) if code == "invalid_client"
        ));
    }

    #[tokio::test]
    async fn start_login_surfaces_network_error() {
        let (_dir, svc) = temp_service(Arc::default());
        assert!(matches!(
            svc.start_login().await,
            Err(AuthError::Network(_))
        ));
    }
}
