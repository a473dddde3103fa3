//! HTTP middleware: request tracking and rate limiting

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::{EndpointClass, JwtService, RateLimiter};
use crate::error::AppError;
use crate::services::AuthService;
use crate::store::{TokenBlacklist, UserStore};

/// Shared application state. Arc-wrapped services keep clones cheap; the
/// store trait objects let tests swap Postgres for in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::AppConfig,
    pub jwt_service: Arc<JwtService>,
    pub auth_service: Arc<AuthService>,
    pub users: Arc<dyn UserStore>,
    pub blacklist: Arc<dyn TokenBlacklist>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Request tracking middleware. Generates trace_id/request_id, records
/// metrics, and echoes both ids in the response headers.
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();
        let status_code = match status {
            200 => "200",
            201 => "201",
            204 => "204",
            400 => "400",
            401 => "401",
            403 => "403",
            404 => "404",
            409 => "409",
            422 => "422",
            429 => "429",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "status" => status_code).increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        let mut response = response;
        if let Ok(value) = trace_id.parse() {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = request_id.parse() {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn rate_limit(
    state: &AppState,
    class: EndpointClass,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_ip = get_client_ip(&req, state.config.security.trust_proxy);

    state.rate_limiter.check(client_ip, class)?;

    // Downstream middleware reuses the resolved IP
    req.extensions_mut().insert(client_ip);

    Ok(next.run(req).await)
}

/// Default limit for all API traffic
pub async fn general_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    rate_limit(&state, EndpointClass::General, req, next).await
}

/// Tighter limit on login attempts
pub async fn login_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    rate_limit(&state, EndpointClass::Login, req, next).await
}

/// Tighter limit on account creation
pub async fn registration_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    rate_limit(&state, EndpointClass::Registration, req, next).await
}

/// Tighter limit on email/password changes
pub async fn credential_update_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    rate_limit(&state, EndpointClass::CredentialUpdate, req, next).await
}

/// Resolve the client IP. Proxy headers are honored only when the server
/// is configured as proxy-fronted, otherwise they are attacker-settable.
pub fn get_client_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    let headers = req.headers();

    if trust_proxy {
        // X-Forwarded-For may list several hops, the first is the client
        if let Some(forwarded_for) = headers.get("x-forwarded-for") {
            if let Ok(forwarded_str) = forwarded_for.to_str() {
                if let Some(first_ip) = forwarded_str.split(',').next() {
                    if let Ok(addr) = first_ip.trim().parse::<IpAddr>() {
                        return addr;
                    }
                }
            }
        }

        if let Some(real_ip) = headers.get("x-real-ip") {
            if let Ok(ip_str) = real_ip.to_str() {
                if let Ok(addr) = ip_str.parse::<IpAddr>() {
                    return addr;
                }
            }
        }
    }

    if let Some(ip) = req.extensions().get::<IpAddr>() {
        return *ip;
    }

    if let Some(connect_info) =
        req.extensions()
            .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
    {
        return connect_info.0.ip();
    }

    tracing::debug!("Could not determine client IP, using loopback address");
    IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))
}
