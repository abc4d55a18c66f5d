//! Integration tests for the session gate, credential store and request client.

use savebox_core::{ApiClient, CredentialStore, GateState, SessionError, SessionGate};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gate_and_client(dir: &TempDir, server: &MockServer) -> (SessionGate, ApiClient) {
    let gate = SessionGate::new(CredentialStore::file(dir.path()));
    let api = ApiClient::new(server.uri(), gate.token()).unwrap();
    (gate, api)
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_persists_token_and_authenticates() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("username=a%40b.com&password=x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "T1"})))
        .expect(1)
        .mount(&server)
        .await;

    let (mut gate, api) = gate_and_client(&dir, &server);
    assert_eq!(gate.resolve().await, GateState::Unauthenticated);

    gate.login(&api, "a@b.com", "x").await.unwrap();
    assert_eq!(gate.state(), GateState::Authenticated);
    assert_eq!(
        CredentialStore::file(dir.path()).load().await.as_deref(),
        Some("T1")
    );
}

#[tokio::test]
async fn test_register_then_restart_resolves_authenticated() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"access_token": "R1"})))
        .mount(&server)
        .await;

    let (mut gate, api) = gate_and_client(&dir, &server);
    gate.resolve().await;
    gate.register(&api, "new@b.com", "pw").await.unwrap();
    drop(gate);

    // Simulated process restart: fresh gate over the same storage
    let (mut restarted, _) = gate_and_client(&dir, &server);
    assert_eq!(restarted.state(), GateState::Resolving);
    assert_eq!(restarted.resolve().await, GateState::Authenticated);
    assert_eq!(restarted.token().current().as_deref(), Some("R1"));
}

#[tokio::test]
async fn test_logout_then_restart_resolves_unauthenticated() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "T1").await;

    let (mut gate, api) = gate_and_client(&dir, &server);
    gate.resolve().await;
    gate.login(&api, "a@b.com", "x").await.unwrap();
    gate.logout().await.unwrap();
    drop(gate);

    let (mut restarted, _) = gate_and_client(&dir, &server);
    assert_eq!(restarted.resolve().await, GateState::Unauthenticated);
}

#[tokio::test]
async fn test_failed_login_reports_detail_and_stays_signed_out() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Invalid credentials"})))
        .mount(&server)
        .await;

    let (mut gate, api) = gate_and_client(&dir, &server);
    gate.resolve().await;

    let err = gate.login(&api, "a@b.com", "nope").await.unwrap_err();
    assert!(matches!(err, SessionError::Api(_)));
    assert_eq!(err.user_message("Failed to authenticate"), "Invalid credentials");
    assert_eq!(gate.state(), GateState::Unauthenticated);
    assert_eq!(CredentialStore::file(dir.path()).load().await, None);
}

#[tokio::test]
async fn test_register_rejection_without_detail_uses_fallback() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let (mut gate, api) = gate_and_client(&dir, &server);
    gate.resolve().await;
    let err = gate.register(&api, "a@b.com", "x").await.unwrap_err();
    assert_eq!(err.user_message("Failed to register"), "Failed to register");
}

#[tokio::test]
async fn test_requests_after_logout_omit_bearer() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "T1").await;

    Mock::given(method("GET"))
        .and(path("/items/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (mut gate, api) = gate_and_client(&dir, &server);
    gate.resolve().await;
    gate.login(&api, "a@b.com", "x").await.unwrap();
    api.list_items().await.unwrap();

    gate.logout().await.unwrap();
    assert_eq!(CredentialStore::file(dir.path()).load().await, None);
    // Server would reject this; the client does not pre-check
    api.list_items().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let item_requests: Vec<_> = requests
        .iter()
        .filter(|r| r.url.path() == "/items/")
        .collect();
    assert_eq!(item_requests.len(), 2);
    assert_eq!(
        item_requests[0].headers.get("authorization").unwrap(),
        "Bearer T1"
    );
    assert!(item_requests[1].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_client_uses_latest_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/items/"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    // Client built before any token exists
    let (mut gate, api) = gate_and_client(&dir, &server);
    gate.resolve().await;
    gate.establish("T1".to_string()).await.unwrap();
    gate.establish("T2".to_string()).await.unwrap();

    api.list_items().await.unwrap();
}

#[tokio::test]
async fn test_cold_start_without_token_makes_no_requests() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let (mut gate, _api) = gate_and_client(&dir, &server);
    assert_eq!(gate.resolve().await, GateState::Unauthenticated);
    assert_eq!(gate.enter_authenticated().await, GateState::Unauthenticated);

    assert!(server.received_requests().await.unwrap().is_empty());
}
