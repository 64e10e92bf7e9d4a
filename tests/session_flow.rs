//! Session lifecycle scenarios against a mock API.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use aliro::session::{CredentialStore, FileStore, MemoryStore, Role, SessionManager};
use aliro::{AuthError, CoreConfig};
use anyhow::{Result, anyhow};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn manager_for(server: &MockServer) -> Result<SessionManager> {
    SessionManager::new(
        &CoreConfig::new(server.uri()),
        Arc::new(MemoryStore::default()),
    )
}

fn password() -> SecretString {
    SecretString::from("correct-horse")
}

fn login_body(role: &str) -> serde_json::Value {
    json!({
        "tokens": {"accessToken": "acc-1", "refreshToken": "ref-1"},
        "user": {"id": "u-1", "role": role, "email": "partner@example.com"}
    })
}

#[tokio::test]
async fn login_normalizes_identifier_and_installs_session() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "identifier": "partner@example.com",
            "secret": "correct-horse"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server)?;
    let session = manager
        .login("  Partner@Example.COM ", &password(), None)
        .await?;

    assert_eq!(session.user.role, Role::Partner);
    assert!(manager.is_authenticated());
    assert!(manager.has_role(Role::Partner));
    assert_eq!(manager.bearer_token().as_deref(), Some("acc-1"));

    manager.logout();
    assert!(!manager.is_authenticated());
    assert!(manager.bearer_token().is_none());
    Ok(())
}

#[tokio::test]
async fn empty_inputs_fail_before_the_network() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .expect(0)
        .mount(&server)
        .await;

    let manager = manager_for(&server)?;

    let err = manager
        .login("   ", &password(), None)
        .await
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;
    assert!(matches!(err, AuthError::Validation(_)));

    let err = manager
        .login("partner@example.com", &SecretString::from(""), None)
        .await
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;
    assert!(matches!(err, AuthError::Validation(_)));
    assert!(!manager.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn default_service_scope_fills_the_request() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "identifier": "partner@example.com",
            "secret": "correct-horse",
            "serviceScope": "moving"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .expect(1)
        .mount(&server)
        .await;

    let config = CoreConfig::new(server.uri()).with_default_service_scope("moving".to_string());
    let manager = SessionManager::new(&config, Arc::new(MemoryStore::default()))?;

    manager.login("partner@example.com", &password(), None).await?;
    Ok(())
}

#[tokio::test]
async fn explicit_scope_overrides_the_default() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "identifier": "partner@example.com",
            "secret": "correct-horse",
            "serviceScope": "relocation"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .expect(1)
        .mount(&server)
        .await;

    let config = CoreConfig::new(server.uri()).with_default_service_scope("moving".to_string());
    let manager = SessionManager::new(&config, Arc::new(MemoryStore::default()))?;

    manager
        .login("partner@example.com", &password(), Some("relocation"))
        .await?;
    Ok(())
}

#[tokio::test]
async fn admin_login_rejects_non_superadmin_accounts() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "identifier": "partner@example.com",
            "secret": "correct-horse",
            "isAdminLogin": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let manager = SessionManager::new(&CoreConfig::new(server.uri()), store.clone())?;

    let err = manager
        .login_admin("partner@example.com", &password(), None)
        .await
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;

    assert!(matches!(err, AuthError::AccessDenied));
    assert!(!manager.is_authenticated());
    assert!(store.load().is_none());
    Ok(())
}

#[tokio::test]
async fn admin_login_accepts_superadmin() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("superadmin")))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server)?;
    manager
        .login_admin("root@example.com", &password(), None)
        .await?;

    assert!(manager.has_role(Role::Superadmin));
    assert!(manager.has_any_role(&[Role::Partner, Role::Superadmin]));
    Ok(())
}

#[tokio::test]
async fn server_error_kinds_map_to_variants() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "identifier": "locked@example.com",
            "secret": "correct-horse"
        })))
        .respond_with(ResponseTemplate::new(423).set_body_json(json!({
            "kind": "account_locked",
            "remainingMinutes": 23
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "identifier": "wrong@example.com",
            "secret": "correct-horse"
        })))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "kind": "invalid_credentials"
        })))
        .mount(&server)
        .await;

    let manager = manager_for(&server)?;

    let err = manager
        .login("locked@example.com", &password(), None)
        .await
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;
    match err {
        AuthError::AccountLocked { remaining_minutes } => assert_eq!(remaining_minutes, 23),
        other => return Err(anyhow!("expected account locked, got: {other}")),
    }

    let err = manager
        .login("wrong@example.com", &password(), None)
        .await
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(!manager.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_both_tokens() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer acc-1"))
        .and(body_json(json!({"refreshToken": "ref-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tokens": {"accessToken": "acc-2", "refreshToken": "ref-2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server)?;
    manager.login("partner@example.com", &password(), None).await?;

    let refreshed = manager.refresh().await?;
    assert_eq!(refreshed.access_token, "acc-2");
    assert_eq!(refreshed.refresh_token, "ref-2");
    assert_eq!(manager.bearer_token().as_deref(), Some("acc-2"));

    let session = manager.session().ok_or_else(|| anyhow!("expected session"))?;
    assert_eq!(session.user.id, "u-1");
    Ok(())
}

#[tokio::test]
async fn concurrent_refreshes_hit_the_server_once() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "tokens": {"accessToken": "acc-2", "refreshToken": "ref-2"}
                }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server)?;
    manager.login("partner@example.com", &password(), None).await?;

    let (first, second) = tokio::join!(manager.refresh(), manager.refresh());
    let first = first?;
    let second = second?;

    assert_eq!(first.access_token, "acc-2");
    assert_eq!(second.access_token, "acc-2");
    Ok(())
}

#[tokio::test]
async fn logout_during_an_in_flight_refresh_wins() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "tokens": {"accessToken": "acc-2", "refreshToken": "ref-2"}
                }))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let manager = SessionManager::new(&CoreConfig::new(server.uri()), store.clone())?;
    manager.login("partner@example.com", &password(), None).await?;

    let (refreshed, ()) = tokio::join!(manager.refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.logout();
        assert!(!manager.is_authenticated());
    });

    // The late response must not reinstall or re-persist the session.
    let err = refreshed.err().ok_or_else(|| anyhow!("expected error"))?;
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(!manager.is_authenticated());
    assert!(manager.bearer_token().is_none());
    assert!(store.load().is_none());
    Ok(())
}

#[tokio::test]
async fn failed_refresh_tears_the_session_down() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "kind": "invalid_credentials"
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let manager = SessionManager::new(&CoreConfig::new(server.uri()), store.clone())?;
    manager.login("partner@example.com", &password(), None).await?;

    let err = manager
        .refresh()
        .await
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;

    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(!manager.is_authenticated());
    assert!(store.load().is_none());
    Ok(())
}

#[tokio::test]
async fn refresh_without_session_is_rejected() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let manager = manager_for(&server)?;
    let err = manager
        .refresh()
        .await
        .err()
        .ok_or_else(|| anyhow!("expected error"))?;

    assert!(matches!(err, AuthError::InvalidCredentials));
    Ok(())
}

#[tokio::test]
async fn authorize_attaches_the_bearer_token() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/leads"))
        .and(header("authorization", "Bearer acc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server)?;
    manager.login("partner@example.com", &password(), None).await?;

    let client = reqwest::Client::new();
    let response = manager
        .authorize(client.get(format!("{}/leads", server.uri())))
        .send()
        .await?;

    assert!(response.status().is_success());
    Ok(())
}

#[tokio::test]
async fn session_survives_a_restart_through_the_file_store() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("partner")))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let credentials_path = dir.path().join("credentials.json");

    let config = CoreConfig::new(server.uri());
    let manager = SessionManager::new(
        &config,
        Arc::new(FileStore::new(credentials_path.clone())),
    )?;
    manager.login("partner@example.com", &password(), None).await?;
    drop(manager);

    let restarted = SessionManager::new(&config, Arc::new(FileStore::new(credentials_path)))?;
    assert!(!restarted.is_authenticated());
    assert!(restarted.restore());
    assert!(restarted.is_authenticated());
    assert_eq!(restarted.bearer_token().as_deref(), Some("acc-1"));
    assert_eq!(
        restarted.current_user().map(|u| u.id),
        Some("u-1".to_string())
    );
    Ok(())
}
