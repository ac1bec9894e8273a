//! OAuth device-code login and credential lifecycle.

pub mod credential;
pub mod device_code;
pub mod error;
pub mod identity;
pub mod poller;
pub mod provider;
pub mod service;
pub mod session;
pub mod store;

pub use credential::{Credential, TokenResponse};
pub use device_code::{DeviceFlowError, DeviceSession, TokenEndpointResponse};
pub use error::AuthError;
pub use identity::{HttpIdentityLookup, IdentityLookup, RetryingIdentityLookup, UserIdentity};
pub use poller::{PollPolicy, PollProgress, PollState, TokenPoll, TokenPoller};
pub use provider::{DeviceAuthProvider, HttpDeviceAuthProvider};
pub use service::{AuthService, LoginOutcome, SessionStatus};
pub use session::{is_expiring_soon, SessionValidator};
pub use store::{CredentialStore, FileCredentialStore};
