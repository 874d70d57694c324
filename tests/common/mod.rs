//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::json;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use regauth::config::VaultConfig;
use regauth::server::{build_router, AppState};
use regauth::token::{Signer, TokenClaims};
use regauth::vault::VaultClient;

pub const TEST_KEY_PEM: &str = include_str!("../../testdata/key.pem");
pub const TEST_CERT_PEM: &str = include_str!("../../testdata/cert.pem");
pub const TEST_PUBLIC_PEM: &str = include_str!("../../testdata/pubkey.pem");

/// Issuer baked into every test signer
pub const TEST_ISSUER: &str = "test-issuer";

/// Create a signer from the checked-in test key material
pub fn create_test_signer() -> Signer {
    Signer::from_pem(
        "RS256",
        TEST_KEY_PEM.as_bytes(),
        TEST_CERT_PEM.as_bytes(),
        TEST_ISSUER,
        900,
    )
    .expect("Failed to build test signer")
}

/// Create application state wired to a mock credential store
pub fn create_test_state(vault: &MockServer, handler_timeout: Duration) -> AppState {
    let addr = vault.address();
    let client = VaultClient::new(&VaultConfig {
        proto: "http".to_string(),
        host: addr.ip().to_string(),
        port: addr.port(),
        auth_token: "test-vault-token".to_string(),
        timeout_secs: 3,
    });
    AppState {
        signer: Arc::new(create_test_signer()),
        vault: Arc::new(client),
        handler_timeout,
    }
}

/// Mount a user record on the mock credential store
pub async fn mount_user(
    server: &MockServer,
    namespace: &str,
    account: &str,
    password: &str,
    access: &str,
) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/{}/{}", namespace, account)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "access": access, "password": password }
        })))
        .mount(server)
        .await;
}

/// Mount a bare status code for a user lookup
pub async fn mount_status(server: &MockServer, namespace: &str, account: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/{}/{}", namespace, account)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Run a test server in the background and return its address
///
/// The server shuts down when the returned sender is dropped or sent.
pub async fn run_test_server(state: AppState) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let app = build_router(state);

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    // Give the server a moment to start (100ms is sufficient for slow CI systems)
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, shutdown_tx)
}

/// Verify a minted token against the test public key and return its claims
pub fn decode_claims(token: &str, service: &str) -> TokenClaims {
    let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_PEM.as_bytes())
        .expect("Failed to load test public key");
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[service]);
    decode::<TokenClaims>(token, &key, &validation)
        .expect("Token failed verification")
        .claims
}
