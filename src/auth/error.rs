use thiserror::Error;

/// Failure classes of the device-code login and stored-session checks.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider error ({code}): {}", description.as_deref().unwrap_or("no description"))]
    Provider {
        code: String,
        description: Option<String>,
    },
    #[error("Access denied: the authorization request was declined")]
    AuthorizationDenied,
    #[error("Device code expired. Start login again")]
    DeviceCodeExpired,
    #[error("Not authenticated. Run `orbyt login`")]
    NotAuthenticated,
    #[error("Session expired. Please login again")]
    SessionExpired,
    #[error("User doesn't exist or session is no longer valid")]
    NotFound,
    #[error("Login cancelled")]
    Cancelled,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    pub fn provider(code: impl Into<String>, description: Option<String>) -> Self {
        Self::Provider {
            code: code.into(),
            description,
        }
    }

    /// Transient failures worth another attempt against the identity lookup.
    ///
    /// Provider errors count only when their code is a 5xx HTTP status.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Provider { code, .. } => code
                .parse::<u16>()
                .map(|status| (500..600).contains(&status))
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_display_falls_back_without_description() {
        let err = AuthError::provider("invalid_client", None);
        assert_eq!(
            err.to_string(),
            "Provider error (invalid_client): no description"
        );
    }

    #[test]
    fn provider_display_includes_description() {
        let err = AuthError::provider("invalid_client", Some("unknown client".to_string()));
        assert_eq!(
            err.to_string(),
            "Provider error (invalid_client): unknown client"
        );
    }

    #[test]
    fn network_errors_are_retryable() {
        assert!(AuthError::Network("connection refused".into()).is_retryable());
    }

    #[test]
    fn server_status_provider_errors_are_retryable() {
        assert!(AuthError::provider("503", None).is_retryable());
        assert!(!AuthError::provider("404", None).is_retryable());
        assert!(!AuthError::provider("invalid_grant", None).is_retryable());
    }

    #[test]
    fn terminal_auth_errors_are_not_retryable() {
        assert!(!AuthError::NotFound.is_retryable());
        assert!(!AuthError::SessionExpired.is_retryable());
        assert!(!AuthError::AuthorizationDenied.is_retryable());
    }
}
