//! Token endpoint wire contract and engine behavior over HTTP.

use super::*;
use chrono::{Duration as ChronoDuration, Utc};
use spotikit_auth::{
    Credential, ExchangeError, Grant, MockTokenStore, ReauthReason, TokenError, TokenExchanger,
    TokenState,
};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_string, body_string_contains, header, method, path};
use wiremock::Mock;

fn expired_store() -> Arc<MockTokenStore> {
    let store = Arc::new(MockTokenStore::new());
    store.set_credential(Credential {
        access_token: Some("A1".to_string()),
        refresh_token: Some("R1".to_string()),
        expires_at: Utc::now() - ChronoDuration::minutes(10),
    });
    store
}

#[tokio::test]
async fn test_code_exchange_wire_format() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("authorization", BASIC_AUTH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string(
            "grant_type=authorization_code&code=AQB-code&redirect_uri=spotikit%3A%2F%2Fcallback",
        ))
        .respond_with(token_response("A1", Some("R1")))
        .expect(1)
        .mount(&server)
        .await;

    let response = assert_ok!(
        exchange_client(&server)
            .exchange(
                Grant::AuthorizationCode {
                    code: "AQB-code".to_string(),
                    redirect_uri: "spotikit://callback".to_string(),
                },
                &credentials(),
            )
            .await
    );
    assert_eq!(response.access_token, "A1");
    assert_eq!(response.refresh_token.as_deref(), Some("R1"));
    assert_eq!(response.scopes(), vec!["streaming", "user-read-playback-state"]);
}

#[tokio::test]
async fn test_failure_classification() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(body_string_contains("refresh_token=revoked"))
        .respond_with(error_response(400, "invalid_grant"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("refresh_token=down"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("refresh_token=moved"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "https://elsewhere.example"),
        )
        .mount(&server)
        .await;

    let client = exchange_client(&server);
    let refresh = |token: &str| Grant::RefreshToken {
        refresh_token: token.to_string(),
    };

    let revoked = assert_err!(client.exchange(refresh("revoked"), &credentials()).await);
    assert_eq!(
        revoked,
        ExchangeError::InvalidGrant {
            description: Some("invalid_grant from mock".to_string())
        }
    );

    let down = assert_err!(client.exchange(refresh("down"), &credentials()).await);
    assert!(matches!(
        down,
        ExchangeError::Transient {
            status: Some(502),
            ..
        }
    ));

    let moved = assert_err!(client.exchange(refresh("moved"), &credentials()).await);
    assert!(matches!(moved, ExchangeError::Transient { status: None, .. }));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transient() {
    let server = setup_mock_server().await;
    let client = exchange_client(&server);
    drop(server);

    let error = assert_err!(
        client
            .exchange(
                Grant::RefreshToken {
                    refresh_token: "R1".to_string(),
                },
                &credentials(),
            )
            .await
    );
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_concurrent_refresh_hits_endpoint_once() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string("grant_type=refresh_token&refresh_token=R1"))
        .respond_with(token_response("A2", None).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(&server, expired_store()).await;
    let calls = (0..10).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.get_valid_token().await })
    });

    for result in futures::future::join_all(calls).await {
        assert_eq!(result.unwrap().unwrap().secret(), "A2");
    }
    assert_eq!(engine.credential().refresh_token.as_deref(), Some("R1"));
    assert_eq!(engine.state(), TokenState::Valid);
}

#[tokio::test]
async fn test_rejected_refresh_requires_reauth() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .respond_with(error_response(400, "invalid_grant"))
        .expect(1)
        .mount(&server)
        .await;

    let store = expired_store();
    let engine = engine(&server, store.clone()).await;

    assert_eq!(
        engine.get_valid_token().await.unwrap_err(),
        TokenError::NeedsReauth(ReauthReason::RefreshTokenRejected)
    );
    assert_eq!(engine.state(), TokenState::Empty);
    assert_eq!(
        engine.get_valid_token().await.unwrap_err(),
        TokenError::NeedsReauth(ReauthReason::NoCredential)
    );

    engine.flush().await;
    assert!(store.persisted().is_none());
}

#[tokio::test]
async fn test_server_error_keeps_credential_for_retry() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .respond_with(error_response(503, "temporarily_unavailable"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(token_response("A2", Some("R2")))
        .mount(&server)
        .await;

    let engine = engine(&server, expired_store()).await;

    let error = engine.get_valid_token().await.unwrap_err();
    assert!(matches!(error, TokenError::Transient { .. }));
    assert_eq!(engine.state(), TokenState::RefreshFailed);
    assert_eq!(engine.credential().refresh_token.as_deref(), Some("R1"));

    assert_eq!(engine.get_valid_token().await.unwrap().secret(), "A2");
    assert_eq!(engine.credential().refresh_token.as_deref(), Some("R2"));
}
