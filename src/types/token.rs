//! Token Types
//!
//! Token endpoint wire types and the access token handed to callers.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;

use crate::types::credential::seconds;
use crate::types::GrantType;

/// Successful token response from the token endpoint.
///
/// `access_token` and `expires_in` are required by contract; a body missing
/// either fails to deserialize.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (always "Bearer" for this endpoint).
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    /// Refresh token; refresh responses may omit it.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Server-reported lifetime.
    pub fn lifetime(&self) -> Duration {
        seconds(self.expires_in)
    }

    /// Granted scopes as a list.
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_ref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }
}

/// Grant presented to the token endpoint.
#[derive(Clone)]
pub enum Grant {
    /// Authorization code from the interactive flow.
    AuthorizationCode { code: String, redirect_uri: String },
    /// Refresh token from a previous exchange.
    RefreshToken { refresh_token: String },
}

impl Grant {
    /// Grant type of this exchange.
    pub fn grant_type(&self) -> GrantType {
        match self {
            Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Self::RefreshToken { .. } => GrantType::RefreshToken,
        }
    }

    /// Grant-specific form parameters, `grant_type` first.
    pub fn form_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("grant_type", self.grant_type().as_str().to_string())];
        match self {
            Self::AuthorizationCode { code, redirect_uri } => {
                params.push(("code", code.clone()));
                params.push(("redirect_uri", redirect_uri.clone()));
            }
            Self::RefreshToken { refresh_token } => {
                params.push(("refresh_token", refresh_token.clone()));
            }
        }
        params
    }
}

impl std::fmt::Debug for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorizationCode { redirect_uri, .. } => f
                .debug_struct("AuthorizationCode")
                .field("code", &"[REDACTED]")
                .field("redirect_uri", redirect_uri)
                .finish(),
            Self::RefreshToken { .. } => f
                .debug_struct("RefreshToken")
                .field("refresh_token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Access token wrapper for safe handling.
#[derive(Clone)]
pub struct AccessToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create new access token.
    pub fn new(value: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: SecretString::new(value),
            expires_at,
        }
    }

    /// Get token value.
    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }

    /// Absolute expiry.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Get time until expiration.
    pub fn expires_in(&self) -> Option<std::time::Duration> {
        (self.expires_at - Utc::now()).to_std().ok()
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.value.expose_secret())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
