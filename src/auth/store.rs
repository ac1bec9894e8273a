use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::credential::Credential;
use super::error::AuthError;

pub const CREDENTIAL_FILE_NAME: &str = "token.json";

/// Storage for the single active credential.
pub trait CredentialStore: Send + Sync {
    /// Stored credential, or `None` when nothing usable is stored.
    fn load(&self) -> Option<Credential>;
    /// Replace whatever was stored before.
    fn save(&self, credential: &Credential) -> Result<(), AuthError>;
    /// Remove the stored credential. Succeeds when nothing is stored.
    fn clear(&self) -> Result<(), AuthError>;
}

/// JSON credential file, replaced atomically and readable by the owner only.
///
/// # Example
/// ```no_run
/// use chrono::Utc;
/// use orbyt::auth::{Credential, CredentialStore, FileCredentialStore, TokenResponse};
///
/// let store = FileCredentialStore::new("/tmp/orbyt/token.json");
/// let credential = Credential::from_response(
///     TokenResponse {
///         access_token: "tok".to_string(),
///         refresh_token: None,
///         scope: None,
///         token_type: None,
///         expires_in: Some(3600),
///     },
///     Utc::now(),
/// );
/// store.save(&credential)?;
/// # Ok::<(), orbyt::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store rooted in a config directory, using the standard file name.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(CREDENTIAL_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<Credential> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "credential file unreadable");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(credential) => Some(credential),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "credential file corrupt, ignoring");
                None
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let serialized = serde_json::to_vec_pretty(credential)?;
        atomic_write(&self.path, &serialized)?;
        debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "credential removed");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::from(err)),
        }
    }
}

/// Write to a sibling temp file, fsync, then rename over `path`.
///
/// Readers see either the old file or the complete new one. The temp file
/// is removed on every failure path.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        AuthError::Storage(format!("credential path {} has no file name", path.display()))
    })?;
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}",
        file_name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    ));

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(AuthError::from(err));
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(AuthError::from(err));
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
