//! Authentication request/response models

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::UserResponse;

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Not a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 50, message = "First name must be between 1 and 50 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50, message = "Last name must be between 1 and 50 characters"))]
    pub last_name: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Not a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Session response returned by login and registration. The token is also
/// set as a cookie for browsers; the body copy is for non-cookie clients.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub csrf_token: String,
}

/// Email change request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEmailRequest {
    #[validate(email(message = "Not a valid email address"))]
    pub new_email: String,
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
}

/// Password change request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"))]
    pub new_password: String,
}

/// Profile update request. Empty or absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 50, message = "First name must not exceed 50 characters"))]
    pub first_name: Option<String>,
    #[validate(length(max = 50, message = "Last name must not exceed 50 characters"))]
    pub last_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            email: "a@example.com".to_string(),
            password: "Str0ng!Pass".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "Str0ng!Pass".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            email: "a@example.com".to_string(),
            password: "short".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        };
        assert!(short_password.validate().is_err());

        let empty_name = RegisterRequest {
            email: "a@example.com".to_string(),
            password: "Str0ng!Pass".to_string(),
            first_name: "".to_string(),
            last_name: "Lovelace".to_string(),
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_login_request_validation() {
        let missing_password = LoginRequest {
            email: "a@example.com".to_string(),
            password: "".to_string(),
        };
        assert!(missing_password.validate().is_err());
    }
}
