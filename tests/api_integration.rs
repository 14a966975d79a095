//! Link management API integration tests
//!
//! These drive the full application router with `oneshot` requests against
//! an in-memory database and a token verifier that maps `tenant|user`
//! tokens to identities.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wren::app::create_app;
use wren::auth::{AuthError, AuthService, Identity, IdentityVerifier};
use wren::config::Config;
use wren::storage::{SqliteStorage, Storage};

/// Accepts `tenant|user` tokens
struct TenantTokenVerifier;

#[async_trait]
impl IdentityVerifier for TenantTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let (tenant, user) = token
            .split_once('|')
            .ok_or_else(|| AuthError::InvalidToken("Invalid token".to_string()))?;
        Ok(Identity {
            tenant_id: tenant.to_string(),
            user_id: user.to_string(),
            display_name: format!("User {user}"),
        })
    }
}

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.base_url = "https://sho.rt".to_string();
    config
}

async fn test_app() -> Router {
    let storage = create_test_storage().await;
    let auth = Arc::new(AuthService::with_verifier(Arc::new(TenantTokenVerifier)));
    create_app(storage, auth, &test_config()).router
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

const ALICE: &str = "tenant-a|alice";
const BOB: &str = "tenant-b|bob";

#[tokio::test]
async fn test_link_crud_lifecycle() {
    let app = test_app().await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/links",
        Some(ALICE),
        Some(json!({
            "original_url": "https://example.com/docs",
            "custom_short_code": "docs",
            "description": "Team docs"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["short_code"], "docs");
    assert_eq!(created["short_url"], "https://sho.rt/docs");
    assert_eq!(created["original_url"], "https://example.com/docs");
    assert_eq!(created["description"], "Team docs");
    assert_eq!(created["click_count"], 0);
    assert_eq!(created["tenant_id"], "tenant-a");
    assert_eq!(created["created_by"], "alice");
    assert_eq!(created["created_by_name"], "User alice");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app, Method::GET, &format!("/api/links/{id}"), Some(ALICE), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id.as_str());

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/links/{id}"),
        Some(ALICE),
        Some(json!({ "description": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "Renamed");
    assert_eq!(updated["original_url"], "https://example.com/docs");

    let (status, cleared) = send(
        &app,
        Method::PUT,
        &format!("/api/links/{id}"),
        Some(ALICE),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["description"], Value::Null);

    let (status, body) = send(&app, Method::DELETE, &format!("/api/links/{id}"), Some(ALICE), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&app, Method::GET, &format!("/api/links/{id}"), Some(ALICE), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Link not found");

    let (status, _) = send(&app, Method::DELETE, &format!("/api/links/{id}"), Some(ALICE), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generated_code_when_none_given() {
    let app = test_app().await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/links",
        Some(ALICE),
        Some(json!({ "original_url": "https://example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let code = created["short_code"].as_str().unwrap();
    assert!(!code.is_empty());
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()), "{code}");
    assert_eq!(created["short_url"], format!("https://sho.rt/{code}"));
}

#[tokio::test]
async fn test_tenant_isolation() {
    let app = test_app().await;

    let (_, created) = send(
        &app,
        Method::POST,
        "/api/links",
        Some(ALICE),
        Some(json!({ "original_url": "https://example.com/private", "custom_short_code": "private" })),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, links) = send(&app, Method::GET, "/api/links", Some(BOB), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(links, json!([]));

    for (method, uri, body) in [
        (Method::GET, format!("/api/links/{id}"), None),
        (
            Method::PUT,
            format!("/api/links/{id}"),
            Some(json!({ "description": "mine now" })),
        ),
        (Method::GET, format!("/api/links/{id}/analytics"), None),
        (Method::DELETE, format!("/api/links/{id}"), None),
    ] {
        let (status, body) = send(&app, method.clone(), &uri, Some(BOB), body).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(body["error"], "Link not found");
    }

    // Still intact for the owner
    let (status, fetched) = send(&app, Method::GET, &format!("/api/links/{id}"), Some(ALICE), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["description"], Value::Null);
}

#[tokio::test]
async fn test_owner_fields_come_from_identity() {
    let app = test_app().await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/links",
        Some(ALICE),
        Some(json!({
            "original_url": "https://example.com",
            "tenant_id": "tenant-b",
            "created_by": "mallory"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["tenant_id"], "tenant-a");
    assert_eq!(created["created_by"], "alice");
}

#[tokio::test]
async fn test_authentication_required() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/links", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/links", Some("no-separator"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/links")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_and_root_need_no_token() {
    let app = test_app().await;

    for uri in ["/health", "/api/health"] {
        let (status, body) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["timestamp"].is_string());
    }

    let (status, body) = send(&app, Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_validation_errors() {
    let app = test_app().await;

    for payload in [
        json!({ "original_url": "not a url" }),
        json!({ "original_url": "" }),
        json!({ "original_url": "ftp://example.com/file" }),
        json!({ "original_url": "https://example.com", "custom_short_code": "has space" }),
        json!({ "original_url": "https://example.com", "custom_short_code": "api" }),
        json!({ "original_url": "https://example.com", "custom_short_code": "x".repeat(51) }),
        json!({ "custom_short_code": "missing-url" }),
    ] {
        let (status, body) = send(&app, Method::POST, "/api/links", Some(ALICE), Some(payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert!(body["error"].is_string(), "{payload} -> {body}");
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/links")
        .header(header::AUTHORIZATION, format!("Bearer {ALICE}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_custom_code_conflict_across_tenants() {
    let app = test_app().await;
    let payload = json!({ "original_url": "https://example.com", "custom_short_code": "Shared" });

    let (status, _) = send(&app, Method::POST, "/api/links", Some(ALICE), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::POST, "/api/links", Some(BOB), Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Shared"));

    // Codes are case-sensitive
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/links",
        Some(BOB),
        Some(json!({ "original_url": "https://example.com", "custom_short_code": "shared" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let app = test_app().await;

    for code in ["first", "second", "third"] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/links",
            Some(ALICE),
            Some(json!({ "original_url": format!("https://example.com/{code}"), "custom_short_code": code })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, links) = send(&app, Method::GET, "/api/links", Some(ALICE), None).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = links
        .as_array()
        .unwrap()
        .iter()
        .map(|link| link["short_code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn test_development_identity_mode() {
    let storage = create_test_storage().await;
    let config = test_config();
    let auth = Arc::new(
        AuthService::from_config(&config.auth)
            .await
            .unwrap(),
    );
    let app = create_app(storage, auth, &config).router;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/links",
        None,
        Some(json!({ "original_url": "https://example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["tenant_id"], "test-tenant-id");
    assert_eq!(created["created_by"], "test-user-id");
    assert_eq!(created["created_by_name"], "Test User");
}
