//! Integration tests using WireMock
//!
//! These tests drive the real reqwest transport against a mock token endpoint
//! and the file stores against temporary directories.

mod client;
mod stores;
mod token_endpoint;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use spotikit_auth::{
    ClientCredentials, EngineOptions, ReqwestHttpTransport, TokenExchangeClient,
    TokenLifecycleEngine, TokenStore,
};
use wiremock::{MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/api/token";

/// `Basic base64("client-id:client-secret")`
pub const BASIC_AUTH: &str = "Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=";

/// Helper to create a mock server.
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn credentials() -> ClientCredentials {
    ClientCredentials::new("client-id", "client-secret")
}

pub fn token_endpoint(server: &MockServer) -> String {
    format!("{}{}", server.uri(), TOKEN_PATH)
}

/// Exchange client over the real HTTP transport.
pub fn exchange_client(server: &MockServer) -> TokenExchangeClient<ReqwestHttpTransport> {
    TokenExchangeClient::new(
        Arc::new(ReqwestHttpTransport::with_options(Duration::from_secs(5), 64 * 1024).unwrap()),
        token_endpoint(server),
        Duration::from_secs(5),
    )
}

/// Engine wired to the mock server and `store`.
pub async fn engine(server: &MockServer, store: Arc<dyn TokenStore>) -> TokenLifecycleEngine {
    TokenLifecycleEngine::open(
        credentials(),
        Arc::new(exchange_client(server)),
        store,
        EngineOptions::default(),
    )
    .await
}

/// Helper to create success response templates.
pub fn token_response(access: &str, refresh: Option<&str>) -> ResponseTemplate {
    let mut body = json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "streaming user-read-playback-state",
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    ResponseTemplate::new(200).set_body_json(body)
}

/// Helper to create error response templates.
pub fn error_response(status: u16, error: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": error,
        "error_description": format!("{} from mock", error),
    }))
}
