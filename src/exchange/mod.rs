//! Token Exchange Client
//!
//! Performs the authorization-code and refresh-token grants against the fixed
//! token endpoint and classifies every outcome.

use async_trait::async_trait;
use base64::Engine;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::core::{HttpMethod, HttpRequest, HttpTransport};
use crate::error::{create_error_from_response, ExchangeError};
use crate::types::{ClientCredentials, Grant, TokenResponse};

/// Token endpoint interface.
///
/// Implementations are stateless and may be called concurrently.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Trade a grant for a token response.
    async fn exchange(
        &self,
        grant: Grant,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, ExchangeError>;
}

/// Token exchange client over an [`HttpTransport`].
pub struct TokenExchangeClient<T: HttpTransport> {
    transport: Arc<T>,
    token_endpoint: String,
    timeout: Duration,
}

impl<T: HttpTransport> TokenExchangeClient<T> {
    /// Create new exchange client.
    pub fn new(transport: Arc<T>, token_endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            token_endpoint: token_endpoint.into(),
            timeout,
        }
    }

    /// Token endpoint this client posts to.
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    fn build_request_body(grant: &Grant) -> String {
        grant
            .form_params()
            .into_iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(&v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn build_request_headers(credentials: &ClientCredentials) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("accept".to_string(), "application/json".to_string());

        // Both parts are form-encoded before joining.
        let basic = format!(
            "{}:{}",
            urlencoding::encode(&credentials.client_id),
            urlencoding::encode(credentials.client_secret.expose_secret())
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(basic);
        headers.insert("authorization".to_string(), format!("Basic {}", encoded));

        headers
    }

    fn parse_success(body: &str) -> Result<TokenResponse, ExchangeError> {
        let response: TokenResponse =
            serde_json::from_str(body).map_err(|e| ExchangeError::MalformedResponse {
                message: e.to_string(),
            })?;

        if response.access_token.is_empty() {
            return Err(ExchangeError::MalformedResponse {
                message: "empty access_token".to_string(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl<T: HttpTransport> TokenExchanger for TokenExchangeClient<T> {
    async fn exchange(
        &self,
        grant: Grant,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, ExchangeError> {
        let grant_type = grant.grant_type().as_str();
        debug!(grant_type, endpoint = %self.token_endpoint, "Sending token request");

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.token_endpoint.clone(),
            headers: Self::build_request_headers(credentials),
            body: Some(Self::build_request_body(&grant)),
            timeout: Some(self.timeout),
        };

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(grant_type, error = %e, "Token request failed in transport");
            ExchangeError::from(e)
        })?;

        if !response.is_success() {
            let error = create_error_from_response(response.status, &response.body);
            warn!(
                grant_type,
                status = response.status,
                code = error.error_code(),
                "Token endpoint rejected request"
            );
            return Err(error);
        }

        Self::parse_success(&response.body).map_err(|e| {
            error!(grant_type, status = response.status, error = %e, "Token endpoint broke response contract");
            e
        })
    }
}
