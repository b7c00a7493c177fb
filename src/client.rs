//! Spotikit Auth Client
//!
//! High-level client wiring configuration, transport, store and the token
//! lifecycle engine together. This is the surface the remote-control layer and
//! the interactive authorization launcher talk to.

use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::core::{HttpTransport, ReqwestHttpTransport, MAX_RESPONSE_SIZE};
use crate::engine::{EngineOptions, ProactiveRefresh, TokenLifecycleEngine};
use crate::error::{AuthorizationError, ConfigurationError, SpotikitError, TokenResult};
use crate::exchange::TokenExchangeClient;
use crate::notify::TokenSubscription;
use crate::store::{open_token_store, TokenStore};
use crate::telemetry::{NoOpMetrics, TokenMetrics};
use crate::types::{
    AccessToken, AuthorizationRedirect, AuthorizationRequest, AuthorizationUrl, SpotikitConfig,
    TokenState,
};

/// Spotify authorization client.
pub struct SpotikitAuth {
    config: SpotikitConfig,
    engine: TokenLifecycleEngine,
    metrics: Arc<dyn TokenMetrics>,
}

impl SpotikitAuth {
    /// Create a client with the reqwest transport and the store selected by
    /// the storage configuration.
    pub async fn new(config: SpotikitConfig) -> Result<Self, SpotikitError> {
        let transport = Arc::new(ReqwestHttpTransport::with_options(
            config.timeout,
            MAX_RESPONSE_SIZE,
        )?);
        let store = open_token_store(&config.storage);
        Ok(Self::with_components(config, transport, store, Arc::new(NoOpMetrics)).await)
    }

    /// Create a client with custom components.
    pub async fn with_components<T: HttpTransport + 'static>(
        config: SpotikitConfig,
        transport: Arc<T>,
        store: Arc<dyn TokenStore>,
        metrics: Arc<dyn TokenMetrics>,
    ) -> Self {
        let exchanger = Arc::new(TokenExchangeClient::new(
            transport,
            config.provider.token_endpoint.clone(),
            config.timeout,
        ));
        let engine = TokenLifecycleEngine::open(
            config.client.clone(),
            exchanger,
            store,
            EngineOptions {
                refresh_buffer: config.refresh_buffer,
                metrics: metrics.clone(),
            },
        )
        .await;

        Self {
            config,
            engine,
            metrics,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SpotikitConfig {
        &self.config
    }

    /// Get the token lifecycle engine.
    pub fn engine(&self) -> &TokenLifecycleEngine {
        &self.engine
    }

    /// Build the URL that starts interactive authorization.
    pub fn authorization_url(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationUrl, ConfigurationError> {
        let mut url = Url::parse(&self.config.provider.authorization_endpoint).map_err(|_| {
            ConfigurationError::InvalidEndpoint {
                url: self.config.provider.authorization_endpoint.clone(),
            }
        })?;

        let state = request.state.unwrap_or_else(generate_state);
        let scopes = request
            .scopes
            .unwrap_or_else(|| self.config.scopes.clone());

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.client.client_id)
                .append_pair("response_type", request.response_type.as_str())
                .append_pair("redirect_uri", &self.config.redirect_uri)
                .append_pair("state", &state);
            if !scopes.is_empty() {
                query.append_pair("scope", &scopes.join(" "));
            }
            if request.show_dialog {
                query.append_pair("show_dialog", "true");
            }
        }

        self.metrics
            .record_authorization_request(request.response_type.as_str());
        debug!(response_type = request.response_type.as_str(), "Built authorization URL");

        Ok(AuthorizationUrl {
            url: url.to_string(),
            state,
        })
    }

    /// Complete interactive authorization from the redirect it produced.
    ///
    /// A code is exchanged for a credential; an implicit token is installed
    /// as-is. The redirect must echo `expected_state`.
    pub async fn handle_redirect(
        &self,
        redirect_url: &str,
        expected_state: &str,
    ) -> Result<AccessToken, SpotikitError> {
        let redirect = AuthorizationRedirect::parse(redirect_url)?;
        redirect.verify_state(expected_state)?;

        match redirect {
            AuthorizationRedirect::Code { code, .. } => Ok(self
                .engine
                .exchange_code(&code, &self.config.redirect_uri)
                .await?),
            AuthorizationRedirect::Token {
                access_token,
                expires_in,
                ..
            } => Ok(self.engine.install_implicit_token(access_token, expires_in)),
            AuthorizationRedirect::Error {
                error, description, ..
            } => {
                info!(error = %error, "Authorization was not granted");
                Err(AuthorizationError::Denied { error, description }.into())
            }
        }
    }

    /// Exchange a code obtained for the configured redirect URI.
    pub async fn exchange_code(&self, code: &str) -> TokenResult<AccessToken> {
        self.engine
            .exchange_code(code, &self.config.redirect_uri)
            .await
    }

    /// Return a usable access token, refreshing first if needed.
    pub async fn get_valid_token(&self) -> TokenResult<AccessToken> {
        self.engine.get_valid_token().await
    }

    /// Sign out and forget the persisted credential.
    pub fn logout(&self) {
        self.engine.logout();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TokenState {
        self.engine.state()
    }

    /// Subscribe to token changes.
    pub fn subscribe(&self) -> TokenSubscription {
        self.engine.subscribe()
    }

    /// Start background refresh ahead of expiry.
    pub fn spawn_proactive_refresh(&self) -> ProactiveRefresh {
        self.engine.spawn_proactive_refresh()
    }

    /// Wait until every change has been persisted.
    pub async fn flush(&self) {
        self.engine.flush().await;
    }
}

fn generate_state() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}
