//! User domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,

    /// Stored as text: "user", "supporter" or "admin"
    pub role: String,

    // Account state
    pub is_active: bool,
    pub is_verified: bool,
    pub is_supporter: bool,

    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Closed role enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Supporter,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Supporter => "supporter",
            Role::Admin => "admin",
        }
    }

    /// Parse a stored role string. Unknown values map to the least
    /// privileged role rather than failing the whole request.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Role::Admin,
            "supporter" => Role::Supporter,
            _ => Role::User,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The authenticated actor attached to a request. Built once by the auth
/// middleware after the status re-check and never reshaped downstream.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_supporter: bool,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: Role::parse(&user.role),
            is_active: user.is_active,
            is_verified: user.is_verified,
            is_supporter: user.is_supporter,
        }
    }
}

/// Public user representation (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_supporter: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role.clone(),
            is_active: user.is_active,
            is_verified: user.is_verified,
            is_supporter: user.is_supporter,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse::from(&user)
    }
}
