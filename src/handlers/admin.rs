//! Admin maintenance handlers

use crate::{error::AppError, middleware::AppState};
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// POST /api/auth/admin/cleanup-tokens
///
/// Runs the same purge as the background task, on demand.
pub async fn cleanup_tokens(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state.auth_service.cleanup_expired_tokens().await?;

    Ok(Json(json!({
        "message": "Cleanup complete",
        "removed": removed,
    })))
}
