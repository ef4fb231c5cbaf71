//! Contract tests for HsmClient over HTTP against a mocked DSM.
//!
//! ## Endpoints Tested
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | POST   | `/sys/v1/session/auth` | `api_key_*`, `trusted_ca_*`, `auth_*` |
//! | POST   | `/crypto/v1/encrypt`   | `encrypt_*` |
//! | POST   | `/crypto/v1/decrypt`   | `decrypt_*` |

use std::path::PathBuf;
use std::time::Duration;

use civic_hsm::auth::TrustedCaAuth;
use civic_hsm::{
    parse_envelope, AuthMethod, ConfigError, HealthState, HsmClient, HsmConfig, HsmError,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-api-key-0123456789";

fn api_key_client(server: &MockServer) -> HsmClient {
    let config = HsmConfig::api_key(server.uri().parse().unwrap(), API_KEY, "kid-1");
    HsmClient::new(config).unwrap()
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

async fn mount_auth(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/sys/v1/session/auth"))
        .and(header("authorization", format!("Basic {API_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok-1",
            "expires_in": 600,
            "token_type": "Bearer"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ── POST /sys/v1/session/auth ───────────────────────────────────────

#[tokio::test]
async fn api_key_auth_happens_once_for_many_calls() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/crypto/v1/encrypt"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_partial_json(serde_json::json!({
            "key": {"kid": "kid-1"},
            "alg": "AES",
            "mode": "CBC",
            "plain": "Sm9obg=="
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cipher": "q83vEjRWeJA=",
            "iv": "AAECAwQFBgcICQoLDA0ODw==",
            "kid": "kid-1"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    for _ in 0..3 {
        let text = client.encrypt("John").await.unwrap().unwrap();
        let envelope = parse_envelope(&text).unwrap();
        assert_eq!(envelope.cipher, "q83vEjRWeJA=");
        assert_eq!(envelope.iv, "AAECAwQFBgcICQoLDA0ODw==");
    }
}

#[tokio::test]
async fn auth_rejection_is_authentication_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sys/v1/session/auth"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crypto/v1/encrypt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    match client.encrypt("John").await.unwrap_err() {
        HsmError::AuthenticationFailed { endpoint, reason } => {
            assert!(endpoint.ends_with("/sys/v1/session/auth"));
            assert!(reason.contains("401"));
        }
        other => panic!("expected AuthenticationFailed, got: {other:?}"),
    }
}

#[tokio::test]
async fn auth_with_malformed_body_is_authentication_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sys/v1/session/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "x"})))
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, HsmError::AuthenticationFailed { .. }));
}

#[tokio::test]
async fn demo_key_never_contacts_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = HsmConfig::api_key(server.uri().parse().unwrap(), "your-api-key-here", "kid-1");
    let client = HsmClient::new(config).unwrap();
    client.authenticate().await.unwrap();
    assert!(client.is_demo());

    let token = client.ensure_authenticated().await.unwrap();
    assert_eq!(token.as_str(), civic_hsm::demo::DEMO_SESSION_TOKEN);

    let text = client.encrypt("Smith").await.unwrap().unwrap();
    assert_eq!(client.decrypt(&text).await.unwrap().as_deref(), Some("Smith"));
}

// ── Trusted CA ──────────────────────────────────────────────────────

#[tokio::test]
async fn trusted_ca_missing_certificates_fail_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cert = dir.path().join("client.crt");
    let key = dir.path().join("client.key");
    let config = HsmConfig {
        endpoint: server.uri().parse().unwrap(),
        auth: AuthMethod::TrustedCa(TrustedCaAuth::with_paths("app-123", &cert, &key)),
        key_id: "kid-1".into(),
        timeout_secs: 5,
    };
    let client = HsmClient::new(config).unwrap();

    match client.authenticate().await.unwrap_err() {
        HsmError::Config(ConfigError::MissingCertificates { paths }) => {
            assert_eq!(paths, vec![cert, key]);
        }
        other => panic!("expected MissingCertificates, got: {other:?}"),
    }
}

#[tokio::test]
async fn trusted_ca_sends_app_id_and_bearer_on_crypto_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sys/v1/session/auth"))
        .and(header("authorization", "Basic YXBwLTEyMzo="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "mtls-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crypto/v1/decrypt"))
        .and(header("authorization", "Bearer mtls-token"))
        .and(body_partial_json(serde_json::json!({
            "key": {"kid": "kid-1"},
            "cipher": "q83vEjRWeJA=",
            "iv": "AAECAwQFBgcICQoLDA0ODw=="
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "plain": "Sm9obg=="
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = HsmConfig {
        endpoint: server.uri().parse().unwrap(),
        auth: AuthMethod::TrustedCa(TrustedCaAuth::with_paths(
            "app-123",
            fixture("client.crt"),
            fixture("client.key"),
        )),
        key_id: "kid-1".into(),
        timeout_secs: 5,
    };
    let client = HsmClient::new(config).unwrap();
    let plaintext = client
        .decrypt(r#"{"cipher":"q83vEjRWeJA=","iv":"AAECAwQFBgcICQoLDA0ODw=="}"#)
        .await
        .unwrap();
    assert_eq!(plaintext.as_deref(), Some("John"));
}

// ── POST /crypto/v1/encrypt ─────────────────────────────────────────

#[tokio::test]
async fn encrypt_server_error_is_encryption_failed() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/crypto/v1/encrypt"))
        .respond_with(ResponseTemplate::new(500).set_body_string("key disabled"))
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    match client.encrypt("John").await.unwrap_err() {
        HsmError::EncryptionFailed { reason } => {
            assert!(reason.contains("500"));
            assert!(reason.contains("key disabled"));
        }
        other => panic!("expected EncryptionFailed, got: {other:?}"),
    }
}

#[tokio::test]
async fn encrypt_timeout_is_encryption_failed() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/crypto/v1/encrypt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"cipher": "c", "iv": "i"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = HsmConfig::api_key(server.uri().parse().unwrap(), API_KEY, "kid-1");
    config.timeout_secs = 1;
    let client = HsmClient::new(config).unwrap();
    match client.encrypt("John").await.unwrap_err() {
        HsmError::EncryptionFailed { reason } => assert!(reason.contains("timed out")),
        other => panic!("expected EncryptionFailed, got: {other:?}"),
    }
}

// ── POST /crypto/v1/decrypt ─────────────────────────────────────────

#[tokio::test]
async fn decrypt_round_trips_hsm_response() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/crypto/v1/decrypt"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_partial_json(serde_json::json!({
            "alg": "AES",
            "mode": "CBC",
            "cipher": "q83vEjRWeJA="
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "plain": "Sm9obg=="
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let plaintext = client
        .decrypt(r#"{"cipher":"q83vEjRWeJA=","iv":"AAECAwQFBgcICQoLDA0ODw=="}"#)
        .await
        .unwrap();
    assert_eq!(plaintext.as_deref(), Some("John"));
}

#[tokio::test]
async fn decrypt_legacy_value_skips_hsm() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/crypto/v1/decrypt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    assert_eq!(
        client.decrypt("Springfield").await.unwrap().as_deref(),
        Some("Springfield")
    );
}

#[tokio::test]
async fn decrypt_rejection_is_decryption_failed() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/crypto/v1/decrypt"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad padding"))
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let err = client
        .decrypt(r#"{"cipher":"AAAA","iv":"BBBB"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, HsmError::DecryptionFailed { .. }));
}

#[tokio::test]
async fn decrypt_non_base64_plain_is_decryption_failed() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/crypto/v1/decrypt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "plain": "%%%"
        })))
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let err = client
        .decrypt(r#"{"cipher":"AAAA","iv":"BBBB"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, HsmError::DecryptionFailed { .. }));
}

// ── Health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_check_unreachable_hsm_is_unhealthy() {
    let mut config = HsmConfig::api_key("http://127.0.0.1:1".parse().unwrap(), API_KEY, "kid-1");
    config.timeout_secs = 2;
    let client = HsmClient::new(config).unwrap();

    let status = client.health_check().await;
    assert_eq!(status.status, HealthState::Unhealthy);
    assert!(status.error.is_some());
    assert_eq!(status.key_id.as_deref(), Some("kid-1"));
}

#[tokio::test]
async fn health_check_reachable_hsm_is_healthy() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;

    let client = api_key_client(&server);
    let status = client.health_check().await;
    assert!(status.is_healthy());
    assert!(status.token_expires_at.is_some());
}
