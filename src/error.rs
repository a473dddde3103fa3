//! Unified error model
//! Defines the error taxonomy and the JSON error envelope

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("CSRF token missing or invalid")]
    CsrfTokenInvalid,

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation { details: serde_json::Value },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::TokenExpired => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::CsrfTokenInvalid => StatusCode::FORBIDDEN,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::Timeout(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code for the response envelope
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "AUTHENTICATION_FAILED",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::Authorization(_) => "FORBIDDEN",
            AppError::CsrfTokenInvalid => "CSRF_TOKEN_INVALID",
            AppError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Validation { .. } => "VALIDATION_FAILED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Config(_) => "CONFIGURATION_ERROR",
            AppError::Timeout(_) => "DEPENDENCY_TIMEOUT",
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// User-facing message (no sensitive internals)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Authentication(msg) => msg.clone(),
            AppError::TokenExpired => "Token has expired".to_string(),
            AppError::InvalidToken => "Invalid token".to_string(),
            AppError::Authorization(msg) => msg.clone(),
            AppError::CsrfTokenInvalid => "CSRF token missing or invalid".to_string(),
            AppError::RateLimitExceeded { .. } => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            AppError::NotFound(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Validation { .. } => "Validation failed".to_string(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Config(_) => "Service misconfigured".to_string(),
            AppError::Database(_) | AppError::Timeout(_) | AppError::Internal(_) => {
                "An unexpected error occurred. Please try again later.".to_string()
            }
        }
    }

    /// Expected authentication failures are the only errors the optional-auth
    /// variant may translate into an anonymous context. Anything else (store
    /// connectivity, configuration, timeouts) must propagate: a database
    /// outage is not "not logged in".
    pub fn is_expected_auth_failure(&self) -> bool {
        matches!(
            self,
            AppError::Authentication(_)
                | AppError::TokenExpired
                | AppError::InvalidToken
                | AppError::Authorization(_)
        )
    }

    // Convenience constructors
    pub fn authentication(msg: &str) -> Self {
        AppError::Authentication(msg.to_string())
    }

    pub fn authorization(msg: &str) -> Self {
        AppError::Authorization(msg.to_string())
    }

    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn bad_request(msg: &str) -> Self {
        AppError::BadRequest(msg.to_string())
    }

    pub fn conflict(msg: &str) -> Self {
        AppError::Conflict(msg.to_string())
    }

    pub fn internal(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }

    pub fn timeout(msg: &str) -> Self {
        AppError::Timeout(msg.to_string())
    }

    /// Map validator failures into a 422 with field-level details
    pub fn from_validation(errors: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(errors.field_errors())
            .unwrap_or_else(|_| serde_json::json!({}));
        AppError::Validation { details }
    }
}

/// Error response envelope
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        let details = match &self {
            AppError::Validation { details } => Some(details.clone()),
            AppError::RateLimitExceeded { retry_after_secs } => {
                Some(serde_json::json!({ "retry_after_secs": retry_after_secs }))
            }
            _ => None,
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code(),
                message: self.user_message(),
                request_id,
                details,
            },
        };

        if status.is_server_error() {
            tracing::error!(
                code = self.error_code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::debug!(
                code = self.error_code(),
                status = status.as_u16(),
                "Request rejected"
            );
        }

        let mut response = (status, Json(error_response)).into_response();

        // Back-off hint for rate-limited clients
        if let AppError::RateLimitExceeded { retry_after_secs } = self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// From config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}
