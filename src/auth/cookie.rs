//! Auth and CSRF cookie construction
//!
//! The access-token cookie is HttpOnly; the CSRF cookie must stay readable
//! by page scripts so they can echo it back in the request header
//! (double-submit pattern).

use crate::config::SecurityConfig;
use axum::http::{header, HeaderValue, Response};

/// Build the Set-Cookie value for the access token
pub fn access_cookie(security: &SecurityConfig, token: &str, max_age_secs: u64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        security.auth_cookie_name, token, max_age_secs
    );
    if security.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build the Set-Cookie value for the CSRF double-submit token
pub fn csrf_cookie(security: &SecurityConfig, token: &str, max_age_secs: u64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; SameSite=Lax; Max-Age={}",
        security.csrf_cookie_name, token, max_age_secs
    );
    if security.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Expired Set-Cookie values clearing both auth cookies
pub fn clear_cookies(security: &SecurityConfig) -> [String; 2] {
    [
        format!("{}=; Path=/; HttpOnly; Max-Age=0", security.auth_cookie_name),
        format!("{}=; Path=/; Max-Age=0", security.csrf_cookie_name),
    ]
}

/// Append session cookies to a response
pub fn set_session_cookies<B>(
    response: &mut Response<B>,
    security: &SecurityConfig,
    token: &str,
    csrf_token: &str,
    max_age_secs: u64,
) {
    for cookie in [
        access_cookie(security, token, max_age_secs),
        csrf_cookie(security, csrf_token, max_age_secs),
    ] {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
}

/// Append expired cookies to a response (logout)
pub fn unset_session_cookies<B>(response: &mut Response<B>, security: &SecurityConfig) {
    for cookie in clear_cookies(security) {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
}

/// Read a cookie value from a Cookie header string
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        if k == name {
            Some(v)
        } else {
            None
        }
    })
}
