//! CSRF double-submit guard
//!
//! State-changing requests authenticated by the session cookie must echo the
//! CSRF cookie value in a request header. Bearer-token callers are exempt:
//! a browser never attaches an Authorization header on its own, so those
//! requests cannot be ridden cross-site.

use crate::{config::SecurityConfig, error::AppError, middleware::AppState};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use rand::RngCore;
use std::sync::Arc;

use super::cookie::cookie_value;

/// Generate a fresh random CSRF token (32 bytes, hex-encoded)
pub fn generate() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Double-submit check middleware. Runs before rate limiting and
/// authentication for state-changing methods.
pub async fn csrf_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_state_changing(req.method()) {
        check_double_submit(req.headers(), &state.config.security)?;
    }
    Ok(next.run(req).await)
}

fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Validate the cookie/header pair for a single request.
///
/// The guard only applies to cookie-riding requests: bearer callers are
/// exempt by threat model, and requests without a session cookie (login,
/// registration, anonymous posts) have nothing to forge yet.
fn check_double_submit(headers: &HeaderMap, security: &SecurityConfig) -> Result<(), AppError> {
    let has_bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    if has_bearer {
        return Ok(());
    }

    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if cookie_value(cookie_header, &security.auth_cookie_name).is_none() {
        return Ok(());
    }

    let csrf_cookie = cookie_value(cookie_header, &security.csrf_cookie_name);
    let csrf_header = headers
        .get(security.csrf_header_name.as_str())
        .and_then(|v| v.to_str().ok());

    match (csrf_cookie, csrf_header) {
        (Some(cookie), Some(header)) if !cookie.is_empty() && cookie == header => Ok(()),
        _ => {
            tracing::warn!("CSRF double-submit check failed");
            Err(AppError::CsrfTokenInvalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use secrecy::Secret;

    fn test_security() -> SecurityConfig {
        SecurityConfig {
            jwt_secret: Secret::new("test-secret-key-for-testing-only-min-32-chars".to_string()),
            access_token_exp_secs: 3600,
            auth_cookie_name: "access_token".to_string(),
            csrf_cookie_name: "csrf_token".to_string(),
            csrf_header_name: "x-csrf-token".to_string(),
            cookie_secure: false,
            password_min_length: 8,
            password_require_lowercase: true,
            password_require_uppercase: true,
            password_require_digit: true,
            allowed_origin: None,
            trust_proxy: false,
            store_timeout_secs: 5,
        }
    }

    fn check(headers: &HeaderMap) -> Result<(), AppError> {
        check_double_submit(headers, &test_security())
    }

    #[test]
    fn test_generate_is_random_and_long() {
        let a = generate();
        let b = generate();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_matching_pair_passes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=tok; csrf_token=abc123"),
        );
        headers.insert("x-csrf-token", HeaderValue::from_static("abc123"));
        assert!(check(&headers).is_ok());
    }

    #[test]
    fn test_missing_header_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=tok; csrf_token=abc123"),
        );
        match check(&headers) {
            Err(AppError::CsrfTokenInvalid) => {}
            other => panic!("expected CsrfTokenInvalid, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=tok; csrf_token=abc123"),
        );
        headers.insert("x-csrf-token", HeaderValue::from_static("different"));
        assert!(matches!(check(&headers), Err(AppError::CsrfTokenInvalid)));
    }

    #[test]
    fn test_missing_cookie_with_header_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token=tok"));
        headers.insert("x-csrf-token", HeaderValue::from_static("abc123"));
        assert!(matches!(check(&headers), Err(AppError::CsrfTokenInvalid)));
    }

    #[test]
    fn test_bearer_caller_exempt() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer some.jwt"));
        // Even with a mismatched cookie pair present
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=tok; csrf_token=abc123"),
        );
        headers.insert("x-csrf-token", HeaderValue::from_static("different"));
        assert!(check(&headers).is_ok());
    }

    #[test]
    fn test_anonymous_request_without_session_cookie_passes() {
        // Login/registration POSTs carry no session cookie yet
        let headers = HeaderMap::new();
        assert!(check(&headers).is_ok());
    }

    #[test]
    fn test_state_changing_methods() {
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::PUT));
        assert!(is_state_changing(&Method::PATCH));
        assert!(is_state_changing(&Method::DELETE));
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::HEAD));
        assert!(!is_state_changing(&Method::OPTIONS));
    }
}
