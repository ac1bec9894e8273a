//! Error types for Orbyt.

use thiserror::Error;

use crate::auth::AuthError;

/// Exit status used for an interrupted login (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Primary error type for all Orbyt operations.
#[derive(Error, Debug)]
pub enum OrbytError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrbytError {
    /// Non-zero process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Auth(AuthError::Cancelled) => EXIT_INTERRUPTED,
            _ => 1,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, OrbytError>;
