//! Authorization Types
//!
//! Request parameters for the interactive authorization surface and the
//! redirect it eventually produces.

use std::collections::HashMap;
use url::Url;

use crate::error::AuthorizationError;

/// What the authorization surface should hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Authorization code, exchanged for an access and refresh token pair.
    #[default]
    Code,
    /// Implicit grant: short-lived access token, no refresh token.
    Token,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
        }
    }
}

/// Authorization request parameters.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationRequest {
    /// Response type.
    pub response_type: ResponseType,
    /// Scopes to request; configured scopes when `None`.
    pub scopes: Option<Vec<String>>,
    /// CSRF state; generated when `None`.
    pub state: Option<String>,
    /// Force the consent dialog even if already approved.
    pub show_dialog: bool,
}

/// Authorization URL to open in the external surface.
#[derive(Clone, Debug)]
pub struct AuthorizationUrl {
    /// Full URL.
    pub url: String,
    /// State that the redirect must echo back.
    pub state: String,
}

/// Result delivered to the redirect URI.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthorizationRedirect {
    /// Code flow success.
    Code { code: String, state: Option<String> },
    /// Implicit flow success.
    Token {
        access_token: String,
        expires_in: u64,
        state: Option<String>,
    },
    /// Authorization failed or was cancelled.
    Error {
        error: String,
        description: Option<String>,
        state: Option<String>,
    },
}

impl AuthorizationRedirect {
    /// Parse the redirect URL; code-flow values come in the query, implicit
    /// values in the fragment.
    pub fn parse(redirect: &str) -> Result<Self, AuthorizationError> {
        let url = Url::parse(redirect).map_err(|e| AuthorizationError::InvalidRedirect {
            message: e.to_string(),
        })?;

        let mut params: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if let Some(fragment) = url.fragment() {
            params.extend(
                url::form_urlencoded::parse(fragment.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned())),
            );
        }

        let state = params.remove("state");

        if let Some(error) = params.remove("error") {
            return Ok(Self::Error {
                error,
                description: params.remove("error_description"),
                state,
            });
        }

        if let Some(code) = params.remove("code") {
            return Ok(Self::Code { code, state });
        }

        if let Some(access_token) = params.remove("access_token") {
            let expires_in = params
                .get("expires_in")
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| AuthorizationError::InvalidRedirect {
                    message: "implicit grant redirect without a valid expires_in".to_string(),
                })?;
            return Ok(Self::Token {
                access_token,
                expires_in,
                state,
            });
        }

        Err(AuthorizationError::InvalidRedirect {
            message: "redirect carries neither code, access_token nor error".to_string(),
        })
    }

    /// State echoed by the authorization server.
    pub fn state(&self) -> Option<&str> {
        match self {
            Self::Code { state, .. } | Self::Token { state, .. } | Self::Error { state, .. } => {
                state.as_deref()
            }
        }
    }

    /// Reject a redirect whose state does not match the one that was sent.
    pub fn verify_state(&self, expected: &str) -> Result<(), AuthorizationError> {
        match self.state() {
            Some(received) if received == expected => Ok(()),
            received => Err(AuthorizationError::StateMismatch {
                expected: expected.to_string(),
                received: received.unwrap_or_default().to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for AuthorizationRedirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code { state, .. } => f
                .debug_struct("Code")
                .field("code", &"[REDACTED]")
                .field("state", state)
                .finish(),
            Self::Token {
                expires_in, state, ..
            } => f
                .debug_struct("Token")
                .field("access_token", &"[REDACTED]")
                .field("expires_in", expires_in)
                .field("state", state)
                .finish(),
            Self::Error {
                error,
                description,
                state,
            } => f
                .debug_struct("Error")
                .field("error", error)
                .field("description", description)
                .field("state", state)
                .finish(),
        }
    }
}
