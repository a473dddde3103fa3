//! CSRF double-submit guard integration tests
//!
//! Cookie-authenticated state-changing requests must echo the CSRF
//! cookie in a header; bearer-authenticated requests are exempt.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{create_test_app, seed_user};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Log in and return (access_token, csrf_token) from the response body
async fn login_session(app: &Router, email: &str, password: &str) -> (String, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"email": email, "password": password}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    (
        json["access_token"].as_str().unwrap().to_string(),
        json["csrf_token"].as_str().unwrap().to_string(),
    )
}

fn cookie_put(
    uri: &str,
    access_token: &str,
    csrf_cookie: &str,
    csrf_header: Option<&str>,
    body: Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            header::COOKIE,
            format!("access_token={access_token}; csrf_token={csrf_cookie}"),
        );
    if let Some(value) = csrf_header {
        builder = builder.header("x-csrf-token", value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_cookie_request_with_matching_csrf_token_passes() {
    let test_app = create_test_app();
    seed_user(&test_app.users, "mia@example.com", "Sup3rSecret", "user");

    let (access_token, csrf_token) =
        login_session(&test_app.app, "mia@example.com", "Sup3rSecret").await;

    let response = test_app
        .app
        .oneshot(cookie_put(
            "/api/auth/update-profile",
            &access_token,
            &csrf_token,
            Some(&csrf_token),
            json!({"first_name": "Mia"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user"]["first_name"], "Mia");
}

#[tokio::test]
async fn test_cookie_request_without_csrf_header_is_rejected() {
    let test_app = create_test_app();
    seed_user(&test_app.users, "nina@example.com", "Sup3rSecret", "user");

    let (access_token, csrf_token) =
        login_session(&test_app.app, "nina@example.com", "Sup3rSecret").await;

    let response = test_app
        .app
        .oneshot(cookie_put(
            "/api/auth/update-profile",
            &access_token,
            &csrf_token,
            None,
            json!({"first_name": "Nina"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "CSRF_TOKEN_INVALID");
}

#[tokio::test]
async fn test_cookie_request_with_mismatched_csrf_token_is_rejected() {
    let test_app = create_test_app();
    seed_user(&test_app.users, "omar@example.com", "Sup3rSecret", "user");

    let (access_token, csrf_token) =
        login_session(&test_app.app, "omar@example.com", "Sup3rSecret").await;

    let response = test_app
        .app
        .oneshot(cookie_put(
            "/api/auth/update-profile",
            &access_token,
            &csrf_token,
            Some("0000000000000000000000000000000000000000000000000000000000000000"),
            json!({"first_name": "Omar"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bearer_request_is_exempt_from_csrf() {
    let test_app = create_test_app();
    seed_user(&test_app.users, "pete@example.com", "Sup3rSecret", "user");

    let (access_token, _) =
        login_session(&test_app.app, "pete@example.com", "Sup3rSecret").await;

    let response = test_app
        .app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/auth/update-profile")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::from(json!({"first_name": "Pete"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_post_passes_csrf_guard() {
    // Login and registration carry no session cookie, so the guard must
    // let them through for authentication to be possible at all
    let test_app = create_test_app();
    seed_user(&test_app.users, "quinn@example.com", "Sup3rSecret", "user");

    let response = test_app
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"email": "quinn@example.com", "password": "Sup3rSecret"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_requests_skip_csrf_check() {
    let test_app = create_test_app();
    seed_user(&test_app.users, "rosa@example.com", "Sup3rSecret", "user");

    let (access_token, _) =
        login_session(&test_app.app, "rosa@example.com", "Sup3rSecret").await;

    // Cookie-authenticated GET, no CSRF header
    let response = test_app
        .app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::COOKIE, format!("access_token={access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
