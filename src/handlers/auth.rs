//! Authentication HTTP handlers

use crate::{
    auth::{cookie, csrf, jwt::Claims},
    error::AppError,
    middleware::AppState,
    models::auth::*,
    models::user::{Principal, UserResponse},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// Build a session response with cookies attached
fn session_response(
    state: &AppState,
    status: StatusCode,
    user: UserResponse,
    access_token: String,
) -> Response {
    let csrf_token = csrf::generate();
    let body = SessionResponse {
        user,
        access_token: access_token.clone(),
        csrf_token: csrf_token.clone(),
    };

    let mut response = (status, Json(body)).into_response();
    cookie::set_session_cookies(
        &mut response,
        &state.config.security,
        &access_token,
        &csrf_token,
        state.config.security.access_token_exp_secs,
    );

    response
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    req.validate().map_err(AppError::from_validation)?;

    let session = state.auth_service.register(req).await?;

    Ok(session_response(
        &state,
        StatusCode::CREATED,
        UserResponse::from(session.user),
        session.access_token,
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    req.validate().map_err(AppError::from_validation)?;

    let session = state.auth_service.login(req).await?;

    Ok(session_response(
        &state,
        StatusCode::OK,
        UserResponse::from(session.user),
        session.access_token,
    ))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, AppError> {
    state.auth_service.logout(&claims).await?;

    let mut response = Json(json!({"message": "Successfully logged out"})).into_response();
    cookie::unset_session_cookies(&mut response, &state.config.security);

    Ok(response)
}

/// GET /api/auth/me
pub async fn current_user(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .users
        .find_by_id(principal.id)
        .await?
        .ok_or_else(|| AppError::authentication("User not found or inactive"))?;

    Ok(Json(json!({ "user": UserResponse::from(user) })))
}

/// PUT /api/auth/update-email
pub async fn update_email(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<UpdateEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate().map_err(AppError::from_validation)?;

    let user = state.auth_service.update_email(&principal, req).await?;

    Ok(Json(json!({ "user": UserResponse::from(user) })))
}

/// PUT /api/auth/update-password
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate().map_err(AppError::from_validation)?;

    state.auth_service.update_password(&principal, req).await?;

    Ok(Json(json!({"message": "Password updated successfully"})))
}

/// PUT /api/auth/update-profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate().map_err(AppError::from_validation)?;

    let user = state.auth_service.update_profile(&principal, req).await?;

    Ok(Json(json!({ "user": UserResponse::from(user) })))
}
