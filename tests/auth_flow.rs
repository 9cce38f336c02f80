//! End-to-end login, TOTP, and profile-switch flows against a mock server.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use depot_client::{
    AuthFlowState, ClientConfig, ClientError, DepotClient, LoginOutcome, SessionEvent,
};

/// Build a client whose only profile points at the mock server.
fn client_for(server: &ServerGuard, dir: &tempfile::TempDir) -> DepotClient {
    let client = DepotClient::new(ClientConfig::new(dir.path().join("settings.json"))).unwrap();
    client.profiles().add("Test", &server.url()).unwrap();
    client
}

/// A structurally valid JWT whose payload decodes to an admin identity.
fn admin_token() -> String {
    let payload = URL_SAFE_NO_PAD.encode(
        json!({
            "id": 1,
            "username": "admin",
            "email": "admin@example.com",
            "is_admin": true,
            "totp_enabled": true,
        })
        .to_string(),
    );
    format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig")
}

#[tokio::test]
async fn password_only_login_adopts_the_token() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let token = admin_token();

    let login = server
        .mock("POST", "/login")
        .match_body(Matcher::PartialJson(json!({"username": "admin"})))
        .with_status(200)
        .with_body(json!({"access_token": token.clone(), "token_type": "Bearer"}).to_string())
        .create_async()
        .await;

    let client = client_for(&server, &dir);
    let mut events = client.session().subscribe();

    let outcome = client.session().login("admin", "pw").await.unwrap();
    login.assert_async().await;

    match outcome {
        LoginOutcome::LoggedIn { identity } => {
            let identity = identity.expect("payload should decode");
            assert_eq!(identity.username, "admin");
            assert!(identity.is_admin);
        }
        other => panic!("expected LoggedIn, got {other:?}"),
    }
    assert!(client.session().is_logged_in());
    assert_eq!(client.transport().current_token(), Some(token));
    assert!(!client.session().must_change_password());
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::LoggedIn { .. }
    ));
}

#[tokio::test]
async fn totp_enrolled_login_parks_on_the_challenge() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(json!({"totp_required": true, "totp_token": "abc"}).to_string())
        .create_async()
        .await;

    let client = client_for(&server, &dir);
    let outcome = client.session().login("admin", "pw").await.unwrap();

    assert_eq!(outcome, LoginOutcome::TotpRequired);
    assert_eq!(
        client.session().flow_state(),
        AuthFlowState::AwaitingTotp {
            pending_token: "abc".into()
        }
    );
    // No token is adopted until the code is verified.
    assert_eq!(client.transport().current_token(), None);
}

#[tokio::test]
async fn verify_totp_completes_the_login() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let token = admin_token();

    server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(json!({"totp_required": true, "totp_token": "abc"}).to_string())
        .create_async()
        .await;
    let verify = server
        .mock("POST", "/totp/verify")
        .match_body(Matcher::Json(json!({"totp_token": "abc", "code": "123456"})))
        .with_status(200)
        .with_body(json!({"access_token": token.clone()}).to_string())
        .create_async()
        .await;

    let client = client_for(&server, &dir);
    client.session().login("admin", "pw").await.unwrap();

    let identity = client.session().verify_totp("123456").await.unwrap();
    verify.assert_async().await;

    assert_eq!(identity.unwrap().username, "admin");
    assert!(client.session().is_logged_in());
    assert_eq!(client.transport().current_token(), Some(token));
}

#[tokio::test]
async fn failed_totp_keeps_the_challenge_for_retry() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(json!({"totp_required": true, "totp_token": "abc"}).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/totp/verify")
        .with_status(401)
        .with_body("bad code")
        .create_async()
        .await;

    let client = client_for(&server, &dir);
    client.session().login("admin", "pw").await.unwrap();

    let err = client.session().verify_totp("000000").await.unwrap_err();
    assert!(matches!(err, ClientError::Http { status: 401, .. }));
    // Still awaiting, so the user can try again.
    assert_eq!(
        client.session().flow_state(),
        AuthFlowState::AwaitingTotp {
            pending_token: "abc".into()
        }
    );
    assert_eq!(client.transport().current_token(), None);
}

#[tokio::test]
async fn verify_totp_without_a_challenge_is_rejected() {
    let server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server, &dir);

    let err = client.session().verify_totp("123456").await.unwrap_err();
    assert!(matches!(err, ClientError::NotAwaitingTotp));
}

#[tokio::test]
async fn failed_login_stays_logged_out() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    server
        .mock("POST", "/login")
        .with_status(401)
        .with_body("invalid credentials")
        .create_async()
        .await;

    let client = client_for(&server, &dir);
    let err = client.session().login("admin", "wrong").await.unwrap_err();

    assert_eq!(err.to_string(), "HTTP error 401");
    assert_eq!(client.session().flow_state(), AuthFlowState::LoggedOut);
    assert_eq!(client.transport().current_token(), None);
}

#[tokio::test]
async fn must_change_password_flag_is_carried_and_cleared() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(
            json!({"access_token": admin_token(), "must_change_password": true}).to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server, &dir);
    client.session().login("admin", "pw").await.unwrap();
    assert!(client.session().must_change_password());

    client.session().logout().unwrap();
    assert!(!client.session().must_change_password());
}

#[tokio::test]
async fn logout_is_idempotent() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(json!({"access_token": admin_token()}).to_string())
        .create_async()
        .await;

    let client = client_for(&server, &dir);
    client.session().login("admin", "pw").await.unwrap();
    let mut events = client.session().subscribe();

    client.session().logout().unwrap();
    assert_eq!(client.session().flow_state(), AuthFlowState::LoggedOut);
    assert_eq!(client.transport().current_token(), None);
    assert!(matches!(events.try_recv().unwrap(), SessionEvent::LoggedOut));

    // Repeating is a no-op: no state change, no second event.
    client.session().logout().unwrap();
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn switching_profiles_drops_the_session() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(json!({"access_token": admin_token()}).to_string())
        .create_async()
        .await;

    let client = client_for(&server, &dir);
    let b = client.profiles().add("B", "http://b.example").unwrap();

    client.session().login("admin", "pw").await.unwrap();
    assert!(client.session().is_logged_in());

    client.switch_profile(&b).unwrap();

    assert_eq!(client.session().flow_state(), AuthFlowState::LoggedOut);
    assert_eq!(client.transport().current_token(), None);
    assert_eq!(client.transport().current_base_url(), "http://b.example");
    assert_eq!(client.profiles().active_server_id(), Some(b.id));
}

#[tokio::test]
async fn a_restart_always_starts_logged_out() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(json!({"access_token": admin_token()}).to_string())
        .create_async()
        .await;

    {
        let client = client_for(&server, &dir);
        client.session().login("admin", "pw").await.unwrap();
        assert!(client.session().is_logged_in());
    }

    // Same settings file, fresh process: profiles survive, the token does not.
    let reopened =
        DepotClient::new(ClientConfig::new(dir.path().join("settings.json"))).unwrap();
    assert_eq!(reopened.profiles().servers().len(), 1);
    assert_eq!(reopened.session().flow_state(), AuthFlowState::LoggedOut);
    assert_eq!(reopened.transport().current_token(), None);
    assert_eq!(reopened.transport().current_base_url(), server.url());
}

#[tokio::test]
async fn requests_fail_fast_with_no_profile_configured() {
    let dir = tempfile::tempdir().unwrap();
    let client = DepotClient::new(ClientConfig::new(dir.path().join("settings.json"))).unwrap();

    let err = client
        .gateway()
        .get::<serde_json::Value>("/api/v1/repositories")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidUrl));
}
