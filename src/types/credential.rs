//! Credential Types
//!
//! The credential snapshot owned by the lifecycle engine and the values derived
//! from it for callers and observers.

use chrono::{DateTime, Duration, Utc};

use crate::types::{AccessToken, TokenResponse};

/// Immutable snapshot of the persisted OAuth2 credential.
///
/// `access_token` is absent until the first successful exchange after a
/// logout. `expires_at` is the Unix epoch while no token has been issued.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Current bearer token.
    pub access_token: Option<String>,
    /// Long-lived token used to mint new access tokens.
    pub refresh_token: Option<String>,
    /// Absolute expiry of `access_token`.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Credential with no tokens.
    pub fn empty() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Build a credential from its persisted representation.
    ///
    /// An out-of-range expiry collapses to the epoch, which reads as expired.
    pub fn from_parts(
        access_token: Option<String>,
        refresh_token: Option<String>,
        expires_at_millis: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: DateTime::from_timestamp_millis(expires_at_millis)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    /// Credential installed by a code exchange.
    ///
    /// A response without a refresh token yields a credential that cannot be
    /// renewed; the prior refresh token is deliberately not carried over.
    pub fn from_code_response(response: &TokenResponse, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: Some(response.access_token.clone()),
            refresh_token: non_empty(response.refresh_token.as_deref()),
            expires_at: millis_precision(issued_at + response.lifetime()),
        }
    }

    /// Credential produced by a refresh exchange.
    ///
    /// The server may omit the refresh token; the current one is kept then.
    pub fn refreshed(&self, response: &TokenResponse, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: Some(response.access_token.clone()),
            refresh_token: non_empty(response.refresh_token.as_deref())
                .or_else(|| self.refresh_token.clone()),
            expires_at: millis_precision(issued_at + response.lifetime()),
        }
    }

    /// Short-lived credential from the implicit grant. Never has a refresh token.
    pub fn implicit(access_token: String, expires_in: u64, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token: None,
            expires_at: millis_precision(issued_at + seconds(expires_in)),
        }
    }

    /// Check if no access token is held.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
    }

    /// Check if a refresh token is held.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Check if the access token may be handed to a caller at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.access_token.is_some() && now < self.expires_at - buffer
    }

    /// Expiry as Unix epoch milliseconds (persisted form).
    pub fn expires_at_millis(&self) -> i64 {
        self.expires_at.timestamp_millis()
    }

    /// Access token wrapper for callers, if any.
    pub fn access(&self) -> Option<AccessToken> {
        self.access_token
            .as_ref()
            .map(|token| AccessToken::new(token.clone(), self.expires_at))
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

// Expiry is persisted as epoch millis; keep memory and disk identical.
fn millis_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

// Lifetimes beyond u32 seconds are clamped so expiry arithmetic cannot overflow.
pub(crate) fn seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(u64::from(u32::MAX)) as i64)
}

/// Lifecycle state derived from a credential and the last refresh outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No access token.
    Empty,
    /// Access token usable outside the safety buffer.
    Valid,
    /// Access token inside the buffer window or past expiry; next request refreshes.
    Expiring,
    /// Last refresh attempt failed; the access token is unusable.
    RefreshFailed,
}

/// Change notification carrying the current access token, or its absence.
#[derive(Clone, Debug)]
pub struct TokenEvent {
    /// Monotonic commit sequence of the credential this event reflects.
    pub sequence: u64,
    /// Current token; `None` after logout or a rejected refresh.
    pub access_token: Option<AccessToken>,
}

impl TokenEvent {
    /// Token value, if present.
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.secret())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token: refresh.map(str::to_string),
            scope: None,
            extra: HashMap::new(),
        }
    }

    #[test]
    fn test_empty_credential() {
        let credential = Credential::empty();
        assert!(credential.is_empty());
        assert!(!credential.has_refresh_token());
        assert_eq!(credential.expires_at_millis(), 0);
        assert!(!credential.is_usable_at(Utc::now(), Duration::minutes(5)));
    }

    #[test]
    fn test_usable_respects_buffer() {
        let now = Utc::now();
        let credential = Credential {
            access_token: Some("A1".to_string()),
            refresh_token: None,
            expires_at: now + Duration::minutes(10),
        };
        assert!(credential.is_usable_at(now, Duration::minutes(5)));
        assert!(!credential.is_usable_at(now + Duration::minutes(6), Duration::minutes(5)));
    }

    #[test]
    fn test_refresh_keeps_refresh_token_when_omitted() {
        let now = Utc::now();
        let current = Credential {
            access_token: Some("A1".to_string()),
            refresh_token: Some("R1".to_string()),
            expires_at: now - Duration::minutes(10),
        };

        let next = current.refreshed(&response("A2", None, 3600), now);
        assert_eq!(next.access_token.as_deref(), Some("A2"));
        assert_eq!(next.refresh_token.as_deref(), Some("R1"));
        assert_eq!(
            next.expires_at_millis(),
            (now + Duration::seconds(3600)).timestamp_millis()
        );

        let blank = current.refreshed(&response("A3", Some(""), 3600), now);
        assert_eq!(blank.refresh_token.as_deref(), Some("R1"));

        let rotated = current.refreshed(&response("A4", Some("R2"), 3600), now);
        assert_eq!(rotated.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn test_code_response_without_refresh_token() {
        let now = Utc::now();
        let credential = Credential::from_code_response(&response("A1", None, 3600), now);
        assert!(!credential.has_refresh_token());
        assert!(credential.is_usable_at(now, Duration::minutes(5)));
    }

    #[test]
    fn test_from_parts_roundtrip_millis() {
        let credential = Credential::from_parts(Some(String::new()), None, 1_700_000_000_123);
        assert_eq!(credential.access_token.as_deref(), Some(""));
        assert_eq!(credential.expires_at_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let credential = Credential {
            access_token: Some("secret-access".to_string()),
            refresh_token: Some("secret-refresh".to_string()),
            expires_at: Utc::now(),
        };
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }
}
