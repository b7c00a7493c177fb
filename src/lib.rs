//! Spotikit Auth
//!
//! Client-side OAuth2 token lifecycle for the Spotify remote-control
//! integration: acquire, cache, persist, refresh and stream the access token.
//!
//! # Features
//!
//! - Authorization Code exchange and Implicit Grant installation
//! - Cached access token with a 5 minute safety buffer
//! - Coalesced refresh (one exchange in flight, all callers share the outcome)
//! - AES-256-GCM encrypted persistence with a plaintext fallback
//! - Change notifications delivered in commit order
//!
//! # Example
//!
//! ```rust,ignore
//! use spotikit_auth::{spotikit_config, AuthorizationRequest, SpotikitAuth};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = spotikit_config()
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .redirect_uri("spotikit://callback")
//!         .storage_dir("/var/lib/spotikit")
//!         .build()?;
//!
//!     let auth = SpotikitAuth::new(config).await?;
//!
//!     // Open this in the external authorization surface.
//!     let request = auth.authorization_url(AuthorizationRequest::default())?;
//!     println!("Authorize at: {}", request.url);
//!
//!     // ... later, with the redirect the surface delivered:
//!     // auth.handle_redirect(&redirect, &request.state).await?;
//!
//!     match auth.get_valid_token().await {
//!         Ok(token) => println!("Authorization: {}", token.authorization_header()),
//!         Err(e) if e.needs_reauth() => println!("Sign in required"),
//!         Err(e) => println!("Retry later: {}", e),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: credential, token, configuration and authorization types
//! - `error`: error hierarchy and token endpoint error classification
//! - `core`: HTTP transport
//! - `exchange`: token endpoint client
//! - `store`: encrypted and plaintext credential stores
//! - `engine`: token lifecycle engine, persistence actor, proactive refresh
//! - `notify`: change notification channel
//! - `telemetry`: metrics
//! - `builders`: fluent configuration builder
//! - `client`: high-level client combining all of the above

pub mod builders;
pub mod client;
pub mod core;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod notify;
pub mod store;
pub mod telemetry;
pub mod types;

// Re-export main client
pub use client::SpotikitAuth;

// Re-export builders
pub use builders::{spotikit_config, SpotikitConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, get_user_message, parse_error_response, AuthorizationError,
    ConfigurationError, ExchangeError, NetworkError, OAuth2ErrorResponse, ReauthReason,
    SpotikitError, StorageError, TokenError, TokenResult,
};

// Re-export types
pub use types::{
    // Config
    ClientCredentials, GrantType, ProviderConfig, SpotikitConfig, StorageConfig,
    // Token
    AccessToken, Grant, TokenResponse,
    // Credential
    Credential, TokenEvent, TokenState,
    // Auth
    AuthorizationRedirect, AuthorizationRequest, AuthorizationUrl, ResponseType,
};

// Re-export core components
pub use core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport};

// Re-export engine
pub use engine::{EngineOptions, ProactiveRefresh, TokenLifecycleEngine};
pub use exchange::{TokenExchangeClient, TokenExchanger};
pub use notify::{TokenNotifier, TokenSubscription};

// Re-export stores
pub use store::{
    open_token_store, EncryptedFileStore, InMemoryTokenStore, MockTokenStore, PlaintextFileStore,
    StoreOperation, TokenCipher, TokenStore,
};

// Re-export telemetry
pub use telemetry::{
    create_in_memory_metrics, no_op_metrics, InMemoryMetrics, MetricEntry, MetricLabels,
    NoOpMetrics, TokenMetrics,
};
