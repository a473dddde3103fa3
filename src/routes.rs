//! Route registration
//!
//! Middleware layering, outermost first: request tracking, CSRF guard,
//! general rate limit, then per-route limits and authentication.

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

use crate::{
    auth::{admin_middleware, auth_middleware, csrf_middleware},
    handlers,
    middleware::{
        credential_update_rate_limit_middleware, general_rate_limit_middleware,
        login_rate_limit_middleware, registration_rate_limit_middleware,
        request_tracking_middleware, AppState,
    },
};

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Probes bypass rate limiting and CSRF
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    let registration_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.clone(),
            registration_rate_limit_middleware,
        ));

    let login_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(state.clone(), login_rate_limit_middleware));

    // Email and password changes carry their own tighter limit
    let credential_routes = Router::new()
        .route("/api/auth/update-email", put(handlers::auth::update_email))
        .route(
            "/api/auth/update-password",
            put(handlers::auth::update_password),
        )
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        // Limiter wraps auth: burst traffic is counted and cut off before
        // it can probe credentials
        .layer(from_fn_with_state(
            state.clone(),
            credential_update_rate_limit_middleware,
        ));

    let authenticated_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::current_user))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/auth/update-profile",
            put(handlers::auth::update_profile),
        )
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/api/auth/admin/cleanup-tokens",
            post(handlers::admin::cleanup_tokens),
        )
        .layer(from_fn(admin_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let mut api_routes = Router::new()
        .merge(registration_routes)
        .merge(login_routes)
        .merge(credential_routes)
        .merge(authenticated_routes)
        .merge(admin_routes)
        .layer(from_fn_with_state(
            state.clone(),
            general_rate_limit_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), csrf_middleware))
        // Auth payloads are small JSON bodies
        .layer(RequestBodyLimitLayer::new(64 * 1024));

    if let Some(cors) = cors_layer(&state.config.security) {
        api_routes = api_routes.layer(cors);
    }

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}

/// CORS for a cross-origin browser frontend. Credentials (cookies) are
/// allowed, so the origin must be explicit, never a wildcard.
fn cors_layer(security: &crate::config::SecurityConfig) -> Option<CorsLayer> {
    let origin = security.allowed_origin.as_deref()?;
    let origin = origin.parse::<HeaderValue>().ok()?;

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::HeaderName::from_static("x-csrf-token"),
            ]),
    )
}
