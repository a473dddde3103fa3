//! JWT authentication middleware
//!
//! Every authenticated request goes through `resolve_principal`: token
//! extraction, signature/expiry verification, revocation lookup, then a
//! fresh account fetch so deactivation takes effect before token expiry.

use crate::{
    auth::{cookie::cookie_value, jwt::Claims},
    error::AppError,
    middleware::AppState,
    models::user::{Principal, Role},
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;

// Handlers extract the Principal the middleware attached
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| AppError::authentication("No authentication token provided"))
    }
}

/// Pull the token from the Authorization header, falling back to the
/// session cookie. Bearer wins when both are present.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    if bearer.is_some() {
        return bearer;
    }

    headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|header| cookie_value(header, cookie_name))
        .map(|s| s.to_string())
}

/// Full credential check for one request. Errors are the caller's to
/// interpret: required auth turns them into 401/403 responses, optional
/// auth downgrades the expected subset to anonymous.
pub async fn resolve_principal(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Principal, Claims), AppError> {
    let token = extract_token(headers, &state.config.security.auth_cookie_name)
        .ok_or_else(|| AppError::authentication("No authentication token provided"))?;

    let claims = state.jwt_service.verify(&token)?;
    let jti = claims.token_id()?;

    // Every store call here fails closed on timeout; a hung revocation
    // list must not admit the request or stall it forever.
    let store_timeout = Duration::from_secs(state.config.security.store_timeout_secs);

    let revoked = tokio::time::timeout(store_timeout, state.blacklist.is_revoked(jti))
        .await
        .map_err(|_| AppError::timeout("Revocation list lookup timed out"))??;
    if revoked {
        tracing::debug!(jti = %jti, "Rejected revoked token");
        return Err(AppError::InvalidToken);
    }

    // Claims may be up to a token lifetime stale; the account row is the
    // source of truth for existence and active status.
    let user_id = claims.user_id()?;
    let user = tokio::time::timeout(store_timeout, state.users.find_by_id(user_id))
        .await
        .map_err(|_| AppError::timeout("User store lookup timed out"))??
        .ok_or_else(|| AppError::authentication("User not found or inactive"))?;

    if !user.is_active {
        return Err(AppError::authentication("User not found or inactive"));
    }

    Ok((Principal::from(&user), claims))
}

/// Required authentication
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (principal, claims) = resolve_principal(&state, req.headers()).await?;

    req.extensions_mut().insert(principal);
    // Logout needs jti and exp from the presented token
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Optional authentication. Missing, expired, invalid, or revoked
/// credentials degrade to anonymous; anything else (store outage,
/// timeout) propagates, because treating an infrastructure failure as
/// an anonymous visitor would silently drop permissions.
pub async fn optional_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match resolve_principal(&state, req.headers()).await {
        Ok((principal, claims)) => {
            req.extensions_mut().insert(principal);
            req.extensions_mut().insert(claims);
        }
        Err(err) if err.is_expected_auth_failure() => {
            tracing::debug!(error = %err, "Optional auth: proceeding anonymously");
        }
        Err(err) => return Err(err),
    }

    Ok(next.run(req).await)
}

/// Admin gate. Must run after `auth_middleware`.
pub async fn admin_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| AppError::authentication("No authentication token provided"))?;

    if principal.role != Role::Admin {
        tracing::warn!(
            user_id = principal.id,
            role = principal.role.as_str(),
            "Admin access denied"
        );
        return Err(AppError::authorization("Admin access required"));
    }

    Ok(next.run(req).await)
}
