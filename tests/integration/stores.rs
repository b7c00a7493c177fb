//! File store round-trips and persistence across restarts.

use super::*;
use spotikit_auth::{
    open_token_store, spotikit_config, Credential, EncryptedFileStore, PlaintextFileStore,
    TokenCipher, TokenState,
};
use tokio_test::assert_ok;
use wiremock::matchers::method;
use wiremock::Mock;

/// base64 of a 32 byte test key.
pub const TEST_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

fn credential(access: Option<&str>, refresh: Option<&str>) -> Credential {
    Credential::from_parts(
        access.map(str::to_string),
        refresh.map(str::to_string),
        1_900_000_000_123,
    )
}

fn stores(dir: &std::path::Path) -> Vec<Arc<dyn TokenStore>> {
    vec![
        Arc::new(PlaintextFileStore::new(dir, "spotikit")),
        Arc::new(EncryptedFileStore::new(
            dir,
            "spotikit",
            TokenCipher::from_base64(TEST_KEY).unwrap(),
        )),
    ]
}

#[tokio::test]
async fn test_round_trip_keeps_absent_and_empty_apart() {
    let dir = tempfile::tempdir().unwrap();

    for store in stores(dir.path()) {
        for expected in [
            credential(Some("A1"), Some("R1")),
            credential(Some("A1"), None),
            credential(Some(""), Some("")),
            credential(None, Some("R1")),
        ] {
            assert_ok!(store.save(&expected).await);
            assert_eq!(store.load().await.unwrap(), expected);
        }

        assert_ok!(store.clear().await);
        assert_eq!(store.load().await.unwrap(), Credential::empty());
        // Clearing twice is not an error.
        assert_ok!(store.clear().await);
    }
}

#[tokio::test]
async fn test_encrypted_file_hides_values() {
    let dir = tempfile::tempdir().unwrap();
    let store = EncryptedFileStore::new(
        dir.path(),
        "spotikit",
        TokenCipher::from_base64(TEST_KEY).unwrap(),
    );
    store
        .save(&credential(Some("BQC-access"), Some("AQD-refresh")))
        .await
        .unwrap();

    let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
    assert!(!raw.contains("BQC-access"));
    assert!(!raw.contains("AQD-refresh"));
    assert!(!raw.contains("1900000000123"));
    assert!(store.path().ends_with("spotikit.sealed.json"));
}

#[tokio::test]
async fn test_config_selects_store() {
    let dir = tempfile::tempdir().unwrap();
    let base = || {
        spotikit_config()
            .client_id("client-id")
            .client_secret("client-secret")
            .redirect_uri("spotikit://callback")
            .storage_dir(dir.path())
    };

    let sealed = open_token_store(&base().encryption_key(TEST_KEY).build().unwrap().storage);
    assert!(sealed.is_encrypted());

    let plain = open_token_store(&base().build().unwrap().storage);
    assert!(!plain.is_encrypted());

    let degraded = open_token_store(&base().encryption_key("short").build().unwrap().storage);
    assert!(!degraded.is_encrypted());
}

#[tokio::test]
async fn test_credential_survives_restart() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .respond_with(token_response("A1", Some("R1")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let open_store = || -> Arc<dyn TokenStore> {
        Arc::new(EncryptedFileStore::new(
            dir.path(),
            "spotikit",
            TokenCipher::from_base64(TEST_KEY).unwrap(),
        ))
    };

    let first = engine(&server, open_store()).await;
    first
        .exchange_code("AQB-code", "spotikit://callback")
        .await
        .unwrap();
    first.flush().await;
    let issued = first.credential();
    drop(first);

    let second = engine(&server, open_store()).await;
    assert_eq!(second.credential(), issued);
    assert_eq!(second.state(), TokenState::Valid);
    assert_eq!(second.get_valid_token().await.unwrap().secret(), "A1");

    second.logout();
    second.flush().await;
    drop(second);

    let third = engine(&server, open_store()).await;
    assert_eq!(third.state(), TokenState::Empty);
}
