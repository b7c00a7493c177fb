//! End-to-end flows through the high-level client.

use super::*;
use futures::StreamExt;
use spotikit_auth::{
    spotikit_config, AuthorizationRequest, ReauthReason, SpotikitAuth, SpotikitConfig,
    TokenError, TokenState,
};
use tokio_test::assert_ok;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::Mock;

use crate::stores::TEST_KEY;

fn config(server: &MockServer, dir: &std::path::Path) -> SpotikitConfig {
    spotikit_config()
        .client_id("client-id")
        .client_secret("client-secret")
        .redirect_uri("spotikit://callback")
        .token_endpoint(token_endpoint(server))
        .storage_dir(dir)
        .encryption_key(TEST_KEY)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_authorize_refresh_and_logout() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("authorization", BASIC_AUTH))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(token_response("A1", Some("R1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token&refresh_token=R1"))
        .respond_with(token_response("A2", None))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = assert_ok!(SpotikitAuth::new(config(&server, dir.path())).await);
    let mut events = auth.subscribe();
    assert_eq!(events.next().await.unwrap().token(), None);

    let request = assert_ok!(auth.authorization_url(AuthorizationRequest::default()));
    let url = Url::parse(&request.url).unwrap();
    assert!(url
        .query_pairs()
        .any(|(k, v)| k == "response_type" && v == "code"));

    let redirect = format!("spotikit://callback?code=AQB-code&state={}", request.state);
    let token = assert_ok!(auth.handle_redirect(&redirect, &request.state).await);
    assert_eq!(token.secret(), "A1");
    assert_eq!(events.next().await.unwrap().token(), Some("A1"));

    let refreshed = assert_ok!(auth.engine().refresh().await);
    assert_eq!(refreshed.secret(), "A2");
    assert_eq!(events.next().await.unwrap().token(), Some("A2"));
    assert_eq!(auth.engine().credential().refresh_token.as_deref(), Some("R1"));

    auth.logout();
    assert_eq!(events.next().await.unwrap().token(), None);
    assert_eq!(auth.state(), TokenState::Empty);
    assert_eq!(
        auth.get_valid_token().await.unwrap_err(),
        TokenError::NeedsReauth(ReauthReason::NoCredential)
    );
}

#[tokio::test]
async fn test_new_client_resumes_persisted_session() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .respond_with(token_response("A1", Some("R1")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    {
        let auth = SpotikitAuth::new(config(&server, dir.path())).await.unwrap();
        auth.exchange_code("AQB-code").await.unwrap();
        auth.flush().await;
    }

    let resumed = SpotikitAuth::new(config(&server, dir.path())).await.unwrap();
    assert_eq!(resumed.state(), TokenState::Valid);
    assert_eq!(resumed.get_valid_token().await.unwrap().secret(), "A1");
}
