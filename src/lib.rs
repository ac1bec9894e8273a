//! Orbyt: device-code login for a headless CLI.
//!
//! Authenticates against an identity provider with the OAuth 2.0 Device
//! Authorization Grant and keeps the resulting credential on disk for later
//! invocations.
//!
//! # Quick Start
//!
//! ```no_run
//! use orbyt::auth::AuthService;
//! use orbyt::config::OrbytConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> orbyt::error::Result<()> {
//! let config = OrbytConfig::load()?;
//! let service = AuthService::from_config(&config)?;
//! let session = service.start_login().await?;
//! println!("Visit {} and enter {}", session.display_uri(), session.user_code);
//! let outcome = service
//!     .complete_login(&session, &CancellationToken::new(), |_| {})
//!     .await?;
//! println!("persisted: {}", outcome.persisted());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
