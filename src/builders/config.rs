//! Configuration Builder
//!
//! Fluent builder for the client configuration, optionally seeded from the
//! environment.

use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::ConfigurationError;
use crate::types::{
    ClientCredentials, ProviderConfig, SpotikitConfig, StorageConfig,
    DEFAULT_AUTHORIZATION_ENDPOINT, DEFAULT_NAMESPACE, DEFAULT_REFRESH_BUFFER_SECS,
    DEFAULT_SCOPES, DEFAULT_TIMEOUT_SECS, DEFAULT_TOKEN_ENDPOINT,
};

pub const ENV_CLIENT_ID: &str = "SPOTIKIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SPOTIKIT_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "SPOTIKIT_REDIRECT_URI";
pub const ENV_SCOPE: &str = "SPOTIKIT_SCOPE";
pub const ENV_TOKEN_ENDPOINT: &str = "SPOTIKIT_TOKEN_ENDPOINT";
pub const ENV_STORAGE_DIR: &str = "SPOTIKIT_STORAGE_DIR";
pub const ENV_ENCRYPTION_KEY: &str = "SPOTIKIT_ENCRYPTION_KEY";

/// Longest accepted refresh buffer.
const MAX_REFRESH_BUFFER: Duration = Duration::from_secs(24 * 60 * 60);

/// Client configuration builder.
pub struct SpotikitConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    redirect_uri: Option<String>,
    scopes: Vec<String>,
    authorization_endpoint: String,
    token_endpoint: String,
    refresh_buffer: Duration,
    timeout: Duration,
    storage_dir: Option<PathBuf>,
    namespace: String,
    encryption_key: Option<SecretString>,
}

impl Default for SpotikitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SpotikitConfigBuilder {
    /// Create new configuration builder with Spotify defaults.
    pub fn new() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            refresh_buffer: Duration::from_secs(DEFAULT_REFRESH_BUFFER_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            storage_dir: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            encryption_key: None,
        }
    }

    /// Seed the builder from `SPOTIKIT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Seed the builder from any key lookup. Unset and empty values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = Self::new();

        if let Some(value) = get(ENV_CLIENT_ID) {
            builder = builder.client_id(value);
        }
        if let Some(value) = get(ENV_CLIENT_SECRET) {
            builder = builder.client_secret(value);
        }
        if let Some(value) = get(ENV_REDIRECT_URI) {
            builder = builder.redirect_uri(value);
        }
        if let Some(value) = get(ENV_SCOPE) {
            builder = builder.scopes(value.split_whitespace().map(String::from).collect());
        }
        if let Some(value) = get(ENV_TOKEN_ENDPOINT) {
            builder = builder.token_endpoint(value);
        }
        if let Some(value) = get(ENV_STORAGE_DIR) {
            builder = builder.storage_dir(value);
        }
        if let Some(value) = get(ENV_ENCRYPTION_KEY) {
            builder = builder.encryption_key(value);
        }
        builder
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set redirect URI.
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Replace requested scopes.
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Add a scope.
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Set authorization endpoint.
    pub fn authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = endpoint.into();
        self
    }

    /// Set token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Set refresh buffer.
    pub fn refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set directory for the persisted credential.
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Set persistence namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set base64 encoded 256-bit encryption key.
    pub fn encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(SecretString::new(key.into()));
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<SpotikitConfig, ConfigurationError> {
        let client_id = required(self.client_id, "client_id")?;
        let client_secret = self
            .client_secret
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "client_secret".to_string(),
            })?;
        if client_secret.expose_secret().is_empty() {
            return Err(ConfigurationError::MissingRequired {
                field: "client_secret".to_string(),
            });
        }
        let redirect_uri = required(self.redirect_uri, "redirect_uri")?;

        validate_url(&redirect_uri)?;
        validate_url(&self.authorization_endpoint)?;
        validate_url(&self.token_endpoint)?;

        if self.refresh_buffer >= MAX_REFRESH_BUFFER {
            return Err(ConfigurationError::InvalidConfig {
                message: format!(
                    "refresh buffer must be shorter than {:?}",
                    MAX_REFRESH_BUFFER
                ),
            });
        }
        if self.namespace.is_empty()
            || self
                .namespace
                .contains(|c: char| c == '/' || c == '\\' || c == '.')
        {
            return Err(ConfigurationError::InvalidConfig {
                message: format!("invalid storage namespace: {:?}", self.namespace),
            });
        }

        let storage_defaults = StorageConfig::default();
        Ok(SpotikitConfig {
            client: ClientCredentials {
                client_id,
                client_secret,
            },
            redirect_uri,
            scopes: self.scopes,
            provider: ProviderConfig {
                authorization_endpoint: self.authorization_endpoint,
                token_endpoint: self.token_endpoint,
            },
            refresh_buffer: self.refresh_buffer,
            timeout: self.timeout,
            storage: StorageConfig {
                directory: self.storage_dir.unwrap_or(storage_defaults.directory),
                namespace: self.namespace,
                encryption_key: self.encryption_key,
            },
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ConfigurationError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigurationError::MissingRequired {
            field: field.to_string(),
        })
}

fn validate_url(value: &str) -> Result<(), ConfigurationError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|_| ConfigurationError::InvalidEndpoint {
            url: value.to_string(),
        })
}

/// Create a new configuration builder.
pub fn spotikit_config() -> SpotikitConfigBuilder {
    SpotikitConfigBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn minimal() -> SpotikitConfigBuilder {
        spotikit_config()
            .client_id("client-id")
            .client_secret("client-secret")
            .redirect_uri("spotikit://callback")
    }

    #[test]
    fn test_builder_defaults() {
        let config = minimal().build().unwrap();

        assert_eq!(config.client.client_id, "client-id");
        assert_eq!(config.provider.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
        assert_eq!(config.refresh_buffer, Duration::from_secs(300));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.scopes.len(), DEFAULT_SCOPES.len());
        assert_eq!(config.storage.namespace, "spotikit");
        assert_eq!(
            config.storage.directory,
            crate::types::default_storage_dir()
        );
        assert!(config.storage.encryption_key.is_none());
    }

    #[test]
    fn test_builder_missing_fields() {
        assert_eq!(
            spotikit_config().build().unwrap_err(),
            ConfigurationError::MissingRequired {
                field: "client_id".to_string()
            }
        );
        assert_eq!(
            spotikit_config()
                .client_id("id")
                .client_secret("")
                .build()
                .unwrap_err(),
            ConfigurationError::MissingRequired {
                field: "client_secret".to_string()
            }
        );
        assert!(matches!(
            spotikit_config()
                .client_id("id")
                .client_secret("secret")
                .build(),
            Err(ConfigurationError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_builder_validates_endpoints() {
        assert!(matches!(
            minimal().token_endpoint("not a url").build(),
            Err(ConfigurationError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            minimal().redirect_uri("callback").build(),
            Err(ConfigurationError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_builder_rejects_bad_buffer_and_namespace() {
        assert!(matches!(
            minimal()
                .refresh_buffer(Duration::from_secs(24 * 60 * 60))
                .build(),
            Err(ConfigurationError::InvalidConfig { .. })
        ));
        assert!(minimal().namespace("../escape").build().is_err());
    }

    #[test]
    fn test_add_scope_deduplicates() {
        let config = minimal()
            .scopes(vec![])
            .add_scope("streaming")
            .add_scope("streaming")
            .build()
            .unwrap();
        assert_eq!(config.scopes, vec!["streaming"]);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_CLIENT_ID, "env-client"),
            (ENV_CLIENT_SECRET, "env-secret"),
            (ENV_REDIRECT_URI, "spotikit://env"),
            (ENV_SCOPE, "streaming  app-remote-control"),
            (ENV_TOKEN_ENDPOINT, "http://127.0.0.1:9000/api/token"),
            (ENV_STORAGE_DIR, "/var/lib/spotikit"),
            (ENV_ENCRYPTION_KEY, ""),
        ]
        .into_iter()
        .collect();

        let config = SpotikitConfigBuilder::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
            .build()
            .unwrap();

        assert_eq!(config.client.client_id, "env-client");
        assert_eq!(config.redirect_uri, "spotikit://env");
        assert_eq!(config.scopes, vec!["streaming", "app-remote-control"]);
        assert_eq!(config.provider.token_endpoint, "http://127.0.0.1:9000/api/token");
        assert_eq!(config.storage.directory, PathBuf::from("/var/lib/spotikit"));
        assert!(config.storage.encryption_key.is_none());
    }
}
