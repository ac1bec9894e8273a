//! Configuration system (layered: flags > env > config file > defaults).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::auth::store::CREDENTIAL_FILE_NAME;
use crate::error::OrbytError;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3005";
pub const DEFAULT_SCOPE: &str = "openid profile email";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolved settings for one CLI invocation.
///
/// # Example
/// ```
/// use orbyt::config::OrbytConfig;
///
/// let config = OrbytConfig::from_lookup(|key| match key {
///     "ORBYT_HOME" => Some("/tmp/orbyt-home".to_string()),
///     "ORBYT_CLIENT_ID" => Some("orbyt-cli".to_string()),
///     _ => None,
/// })?;
/// assert_eq!(config.server_url, "http://localhost:3005");
/// assert!(config.credential_path().ends_with("token.json"));
/// # Ok::<(), orbyt::error::OrbytError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrbytConfig {
    pub server_url: String,
    pub client_id: Option<String>,
    pub scope: String,
    pub config_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    server_url: Option<String>,
    client_id: Option<String>,
    scope: Option<String>,
}

impl OrbytConfig {
    /// Load `.env`, then resolve from the process environment and config file.
    pub fn load() -> Result<Self, OrbytError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` in place of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OrbytError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config_dir = env("ORBYT_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(default_config_dir);
        let file = read_config_file(&config_dir.join(CONFIG_FILE_NAME))?;

        Ok(Self {
            server_url: env("ORBYT_SERVER_URL")
                .or(file.server_url)
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            client_id: env("ORBYT_CLIENT_ID")
                .or_else(|| env("GITHUB_CLIENT_ID"))
                .or(file.client_id),
            scope: env("ORBYT_SCOPE")
                .or(file.scope)
                .unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            config_dir,
        })
    }

    /// Apply a command-line `--server-url` override.
    pub fn with_server_url(mut self, server_url: Option<String>) -> Self {
        if let Some(url) = server_url {
            self.server_url = url;
        }
        self
    }

    /// Apply a command-line `--client-id` override.
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        if client_id.is_some() {
            self.client_id = client_id;
        }
        self
    }

    /// The server URL, validated as absolute http(s).
    pub fn server_url(&self) -> Result<reqwest::Url, OrbytError> {
        let url = reqwest::Url::parse(&self.server_url).map_err(|err| {
            OrbytError::Configuration(format!("invalid server URL {}: {err}", self.server_url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(OrbytError::Configuration(format!(
                "server URL must be http or https, got {other}"
            ))),
        }
    }

    /// The client id, required for starting a login.
    pub fn require_client_id(&self) -> Result<&str, OrbytError> {
        self.client_id.as_deref().ok_or_else(|| {
            OrbytError::Configuration(
                "no OAuth client id; pass --client-id or set ORBYT_CLIENT_ID".to_string(),
            )
        })
    }

    pub fn credential_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIAL_FILE_NAME)
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, OrbytError> {
    let raw = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(err) => return Err(OrbytError::Io(err)),
    };
    debug!(path = %path.display(), "loaded config file");
    toml::from_str(&raw).map_err(|err| {
        OrbytError::Configuration(format!("invalid config file {}: {err}", path.display()))
    })
}

fn default_config_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".orbyt"))
        .unwrap_or_else(|| PathBuf::from(".orbyt"))
}
