//! Security tests for labeler-server
//!
//! Tests security-critical features:
//! - Login and JWT enforcement on protected `/api/*` routes
//! - Image path traversal and non-image files never served

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use labeler_common::db::init_database;
use labeler_server::db::LabelStore;
use labeler_server::services::{Authenticator, ImageIndex};
use labeler_server::{build_router, AppState};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

const USERNAME: &str = "labeler";
const PASSWORD: &str = "s3cret-password";
const SECRET: &str = "integration-test-signing-secret-0123456789";

/// Test helper: Create app over a small image folder, optionally with auth enabled
async fn setup_app(auth: bool) -> (TempDir, TempDir, axum::Router) {
    let images = tempfile::tempdir().unwrap();
    fs::write(images.path().join("a.jpg"), b"jpg").unwrap();
    fs::write(images.path().join("b.png"), b"png").unwrap();
    fs::write(images.path().join("notes.txt"), b"secret notes").unwrap();

    let db = tempfile::tempdir().unwrap();
    let pool = init_database(&db.path().join("labels.db"), "labels")
        .await
        .expect("Should create test database");

    let index = ImageIndex::open(images.path()).expect("Should scan image folder");
    let authenticator = auth.then(|| Authenticator::with_secret(USERNAME, PASSWORD, SECRET, 3600));
    let state = AppState::new(Arc::new(index), LabelStore::new(pool, "labels"), 20)
        .with_auth(authenticator);

    (images, db, build_router(state))
}

fn request(method: &str, uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/login")
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Test helper: Log in and return the `Authorization` header value
async fn bearer(app: &axum::Router) -> String {
    let response = app
        .clone()
        .oneshot(login_request(USERNAME, PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = extract_json(response.into_body()).await;
    format!("Bearer {}", json["accessToken"].as_str().unwrap())
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_login_returns_token() {
    let (_images, _db, app) = setup_app(true).await;

    let response = app.oneshot(login_request(USERNAME, PASSWORD)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = extract_json(response.into_body()).await;
    assert_eq!(json["tokenType"], "bearer");
    assert_eq!(json["expiresIn"], 3600);
    assert!(!json["accessToken"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let (_images, _db, app) = setup_app(true).await;

    for (user, pass) in [(USERNAME, "wrong"), ("someone", PASSWORD), ("", "")] {
        let response = app.clone().oneshot(login_request(user, pass)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}:{}", user, pass);
    }
}

#[tokio::test]
async fn test_login_disabled_without_password() {
    let (_images, _db, app) = setup_app(false).await;

    let response = app.oneshot(login_request(USERNAME, PASSWORD)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (_images, _db, app) = setup_app(true).await;

    for (method, uri) in [
        ("GET", "/api/session"),
        ("POST", "/api/labels/save"),
        ("GET", "/api/labels?queryImage=a.jpg"),
        ("POST", "/api/image_stats/bulk"),
        ("POST", "/api/refresh"),
        ("GET", "/api/batch/0"),
        ("GET", "/api/batches/count"),
        ("POST", "/api/upload_batch"),
        ("POST", "/api/upload_non_labeled"),
    ] {
        let response = app.clone().oneshot(request(method, uri, None)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{} {} should require a token",
            method,
            uri
        );
    }
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let (_images, _db, app) = setup_app(true).await;

    let foreign = Authenticator::with_secret(USERNAME, PASSWORD, "some-other-secret-also-32-chars-long!", 3600)
        .issue(USERNAME)
        .unwrap();
    let foreign = format!("Bearer {}", foreign);
    let valid = bearer(&app).await;
    let basic = valid.replacen("Bearer", "Basic", 1);

    for auth in ["Bearer wrong", "Bearer", basic.as_str(), foreign.as_str()] {
        let response = app
            .clone()
            .oneshot(request("GET", "/api/session", Some(auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "auth {:?}", auth);
    }
}

#[tokio::test]
async fn test_login_token_accepted() {
    let (_images, _db, app) = setup_app(true).await;
    let auth = bearer(&app).await;

    for uri in ["/api/session", "/api/batches/count"] {
        let response = app
            .clone()
            .oneshot(request("GET", uri, Some(&auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
}

#[tokio::test]
async fn test_public_routes_without_token() {
    let (_images, _db, app) = setup_app(true).await;

    for uri in ["/api/health", "/", "/static/app.js", "/images/a.jpg"] {
        let response = app.clone().oneshot(request("GET", uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{} should be public", uri);
    }
}

#[tokio::test]
async fn test_no_password_configured_allows_all() {
    let (_images, _db, app) = setup_app(false).await;

    let response = app.oneshot(request("GET", "/api/session", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Image Path Tests
// =============================================================================

#[tokio::test]
async fn test_path_traversal_rejected() {
    let (_images, _db, app) = setup_app(false).await;

    for uri in [
        "/images/../../etc/passwd",
        "/images/..%2F..%2Fetc%2Fpasswd",
        "/images/%2Fetc%2Fpasswd",
        "/images/./a.jpg",
    ] {
        let response = app.clone().oneshot(request("GET", uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{} must not be served", uri);
    }
}

#[tokio::test]
async fn test_non_image_file_not_served() {
    let (_images, _db, app) = setup_app(false).await;

    let response = app
        .oneshot(request("GET", "/images/notes.txt", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let (_images, _db, app) = setup_app(false).await;

    // Past axum's default 2MB body limit
    let large_body = vec![b'x'; 3 * 1024 * 1024];
    let request = Request::builder()
        .method("POST")
        .uri("/api/labels/save")
        .header("Content-Type", "application/json")
        .body(Body::from(large_body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(
        response.status() == StatusCode::PAYLOAD_TOO_LARGE
            || response.status() == StatusCode::BAD_REQUEST,
        "Expected 413/400 for oversized body, got {}",
        response.status()
    );
}
