//! Persistence interfaces for accounts and revoked tokens
//!
//! Handlers and middleware depend on these traits rather than on sqlx
//! directly, so integration tests can run against in-memory stores.

pub mod memory;
pub mod postgres;

use crate::{error::AppError, models::user::User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemoryTokenBlacklist;
pub use postgres::{PgTokenBlacklist, PgUserStore};

/// Fields needed to create an account row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

/// Mutable credential/profile fields. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Account storage
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Case-insensitive email lookup
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;

    async fn update(&self, id: i64, update: UserUpdate) -> Result<User, AppError>;

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Liveness probe for the readiness endpoint
    async fn ping(&self) -> Result<(), AppError>;
}

/// Revoked-token storage keyed by jti
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Idempotent: revoking an already-revoked jti succeeds.
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), AppError>;

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, AppError>;

    /// Delete entries whose token has already expired. Returns rows removed.
    async fn cleanup_expired(&self) -> Result<u64, AppError>;
}
