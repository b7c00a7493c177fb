//! Configuration Types
//!
//! Client, endpoint and storage configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default Spotify token endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";
/// Default Spotify authorization endpoint.
pub const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.spotify.com/authorize";
/// Tokens are treated as unusable this long before they expire.
pub const DEFAULT_REFRESH_BUFFER_SECS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Fixed persistence namespace.
pub const DEFAULT_NAMESPACE: &str = "spotikit";
/// Scopes needed by the remote-control layer.
pub const DEFAULT_SCOPES: &[&str] = &[
    "streaming",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
];

/// Complete client configuration.
#[derive(Clone, Debug)]
pub struct SpotikitConfig {
    /// Client credentials.
    pub client: ClientCredentials,
    /// Redirect URI registered for the application.
    pub redirect_uri: String,
    /// Scopes requested during interactive authorization.
    pub scopes: Vec<String>,
    /// Endpoint configuration.
    pub provider: ProviderConfig,
    /// Safety margin subtracted from token expiry.
    pub refresh_buffer: Duration,
    /// HTTP timeout.
    pub timeout: Duration,
    /// Persistence configuration.
    pub storage: StorageConfig,
}

/// Authorization server endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Authorization endpoint URL.
    pub authorization_endpoint: String,
    /// Token endpoint URL.
    pub token_endpoint: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
        }
    }
}

/// Client credentials sent as HTTP Basic authentication.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Where and how the credential is persisted.
#[derive(Clone)]
pub struct StorageConfig {
    /// Directory holding the credential file.
    pub directory: PathBuf,
    /// File namespace: `<namespace>.sealed.json` when encrypted, `<namespace>.json` otherwise.
    pub namespace: String,
    /// Base64 encoded 256-bit key. Without a usable key the plaintext store is selected.
    pub encryption_key: Option<SecretString>,
}

/// Per-user credential directory: `<local data dir>/spotikit`, falling back to
/// `~/.spotikit`.
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(DEFAULT_NAMESPACE))
        .or_else(|| dirs::home_dir().map(|home| home.join(format!(".{}", DEFAULT_NAMESPACE))))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", DEFAULT_NAMESPACE)))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_dir(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            encryption_key: None,
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("directory", &self.directory)
            .field("namespace", &self.namespace)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Grant type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "authorization_code")]
    AuthorizationCode,
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}
