//! Error Types
//!
//! Error hierarchy for the token lifecycle: configuration, transport, token
//! endpoint classification, storage and the caller-facing token errors.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the crate facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpotikitError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

impl SpotikitError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "SPOTIKIT_CONFIG",
            Self::Authorization(_) => "SPOTIKIT_AUTH",
            Self::Token(_) => "SPOTIKIT_TOKEN",
        }
    }

    /// Check if the caller must run the interactive authorization flow.
    pub fn needs_reauth(&self) -> bool {
        match self {
            Self::Token(e) => e.needs_reauth(),
            Self::Authorization(_) => true,
            _ => false,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },
}

/// Interactive authorization result error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Authorization denied: {error}")]
    Denied {
        error: String,
        description: Option<String>,
    },

    #[error("State parameter mismatch (possible CSRF attack)")]
    StateMismatch { expected: String, received: String },

    #[error("Invalid redirect: {message}")]
    InvalidRedirect { message: String },
}

/// Network/transport error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },
}

/// Failure of a single grant exchange against the token endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// The server rejected the grant itself. For a refresh grant this means the
    /// refresh token is no longer valid; for a code grant the code was already
    /// consumed or never issued.
    #[error("Invalid grant: {description:?}")]
    InvalidGrant { description: Option<String> },

    /// Network failure or any non-2xx that is not `invalid_grant`.
    #[error("Token endpoint unavailable: {reason}")]
    Transient { status: Option<u16>, reason: String },

    /// 2xx body that does not honour the token response contract.
    #[error("Malformed token response: {message}")]
    MalformedResponse { message: String },
}

impl ExchangeError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidGrant { .. } => "EXCHANGE_INVALID_GRANT",
            Self::Transient { .. } => "EXCHANGE_TRANSIENT",
            Self::MalformedResponse { .. } => "EXCHANGE_MALFORMED",
        }
    }

    /// Check if retrying the same exchange may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidGrant { .. })
    }
}

impl From<NetworkError> for ExchangeError {
    fn from(error: NetworkError) -> Self {
        Self::Transient {
            status: None,
            reason: error.to_string(),
        }
    }
}

/// Storage error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Corrupted data: {message}")]
    CorruptedData { message: String },

    #[error("Encryption failed: {message}")]
    EncryptionFailed { message: String },

    #[error("Decryption failed: {message}")]
    DecryptionFailed { message: String },

    #[error("Invalid encryption key: {message}")]
    InvalidKey { message: String },
}

/// Why a caller has to run the interactive authorization flow again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReauthReason {
    /// No access token has been obtained since the last logout.
    NoCredential,
    /// The token is expiring and there is no refresh token to renew it.
    NoRefreshToken,
    /// The token endpoint rejected the refresh token.
    RefreshTokenRejected,
    /// The credential was cleared or replaced while the exchange was in flight.
    Superseded,
}

impl std::fmt::Display for ReauthReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NoCredential => "no credential available",
            Self::NoRefreshToken => "token expired and no refresh token is available",
            Self::RefreshTokenRejected => "refresh token was rejected",
            Self::Superseded => "credential changed while the exchange was in flight",
        };
        f.write_str(text)
    }
}

/// Error returned to callers of the token lifecycle engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Re-authorization required: {0}")]
    NeedsReauth(ReauthReason),

    #[error("Temporary failure, retry later: {message}")]
    Transient { message: String },

    #[error("Code exchange failed: {0}")]
    Exchange(ExchangeError),
}

impl TokenError {
    /// Check if the caller must run the interactive authorization flow.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, Self::NeedsReauth(_))
    }

    /// Check if the same call may succeed later without user interaction.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::Exchange(e) => e.is_retryable(),
            Self::NeedsReauth(_) => false,
        }
    }
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

/// OAuth2 error body returned by the token endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Classify a non-2xx token endpoint response.
pub fn create_error_from_response(status: u16, body: &str) -> ExchangeError {
    match parse_error_response(body) {
        Some(response) if response.error == "invalid_grant" => ExchangeError::InvalidGrant {
            description: response.error_description,
        },
        Some(response) => ExchangeError::Transient {
            status: Some(status),
            reason: match response.error_description {
                Some(description) => format!("{}: {}", response.error, description),
                None => response.error,
            },
        },
        None => ExchangeError::Transient {
            status: Some(status),
            reason: format!("HTTP {}", status),
        },
    }
}

/// Get user-friendly error message.
pub fn get_user_message(error: &TokenError) -> String {
    match error {
        TokenError::NeedsReauth(ReauthReason::NoCredential) => {
            "You are not signed in to Spotify. Please sign in.".to_string()
        }
        TokenError::NeedsReauth(_) => {
            "Your Spotify session has expired. Please sign in again.".to_string()
        }
        TokenError::Transient { .. } => {
            "Spotify could not be reached. Please try again in a moment.".to_string()
        }
        TokenError::Exchange(ExchangeError::InvalidGrant { .. }) => {
            "The sign-in attempt expired or was already used. Please sign in again.".to_string()
        }
        TokenError::Exchange(_) => "Signing in to Spotify failed. Please try again.".to_string(),
    }
}
