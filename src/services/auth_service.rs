//! Account and session service
//!
//! All credential failures surface as the same "Invalid credentials"
//! message so responses do not reveal whether an email is registered,
//! the password is wrong, or the account is deactivated.

use crate::{
    auth::{jwt::Claims, JwtService, PasswordHasher},
    config::SecurityConfig,
    error::AppError,
    models::auth::{
        LoginRequest, RegisterRequest, UpdateEmailRequest, UpdatePasswordRequest,
        UpdateProfileRequest,
    },
    models::user::{Principal, Role, User},
    store::{NewUser, TokenBlacklist, UserStore, UserUpdate},
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct AuthService {
    users: Arc<dyn UserStore>,
    blacklist: Arc<dyn TokenBlacklist>,
    jwt_service: Arc<JwtService>,
    password_hasher: PasswordHasher,
    security: SecurityConfig,
}

/// A freshly authenticated session: the user plus a signed token
pub struct IssuedSession {
    pub user: User,
    pub access_token: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        blacklist: Arc<dyn TokenBlacklist>,
        jwt_service: Arc<JwtService>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            users,
            blacklist,
            jwt_service,
            password_hasher: PasswordHasher::new(),
            security,
        }
    }

    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> Result<IssuedSession, AppError> {
        PasswordHasher::validate_password_policy(&request.password, &self.security)?;

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(AppError::conflict("Email already registered"));
        }

        let password_hash = self.password_hasher.hash(&request.password)?;
        let user = self
            .users
            .create(NewUser {
                email: request.email.to_lowercase(),
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
                role: Role::User.as_str().to_string(),
            })
            .await?;

        info!(user_id = user.id, "User registered");

        let access_token = self.jwt_service.issue(&Principal::from(&user))?;
        Ok(IssuedSession { user, access_token })
    }

    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<IssuedSession, AppError> {
        let user = match self.users.find_by_email(&request.email).await? {
            Some(user) => user,
            None => {
                // Hash anyway so lookup misses take as long as mismatches
                let _ = self.password_hasher.hash(&request.password);
                return Err(AppError::authentication("Invalid credentials"));
            }
        };

        self.password_hasher
            .verify(&request.password, &user.password_hash)?;

        if !user.is_active {
            warn!(user_id = user.id, "Login attempt on deactivated account");
            return Err(AppError::authentication("Invalid credentials"));
        }

        let now = Utc::now();
        self.users.record_login(user.id, now).await?;

        info!(user_id = user.id, "User logged in");

        let access_token = self.jwt_service.issue(&Principal::from(&user))?;
        Ok(IssuedSession {
            user: User {
                last_login: Some(now),
                ..user
            },
            access_token,
        })
    }

    /// Revoke the presented token. Safe to call twice with the same token.
    #[instrument(skip(self, claims))]
    pub async fn logout(&self, claims: &Claims) -> Result<(), AppError> {
        let jti = claims.token_id()?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or_else(Utc::now);

        self.blacklist.revoke(jti, expires_at).await?;
        info!(jti = %jti, "Token revoked");

        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn update_email(
        &self,
        principal: &Principal,
        request: UpdateEmailRequest,
    ) -> Result<User, AppError> {
        let user = self.require_user(principal.id).await?;

        self.password_hasher
            .verify(&request.current_password, &user.password_hash)
            .map_err(|_| AppError::authentication("Current password is incorrect"))?;

        let new_email = request.new_email.to_lowercase();
        if let Some(existing) = self.users.find_by_email(&new_email).await? {
            if existing.id != user.id {
                return Err(AppError::conflict("Email already in use"));
            }
        }

        let updated = self
            .users
            .update(
                user.id,
                UserUpdate {
                    email: Some(new_email),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = user.id, "Email updated");
        Ok(updated)
    }

    #[instrument(skip(self, request))]
    pub async fn update_password(
        &self,
        principal: &Principal,
        request: UpdatePasswordRequest,
    ) -> Result<User, AppError> {
        let user = self.require_user(principal.id).await?;

        self.password_hasher
            .verify(&request.current_password, &user.password_hash)
            .map_err(|_| AppError::authentication("Current password is incorrect"))?;

        PasswordHasher::validate_password_policy(&request.new_password, &self.security)?;
        let password_hash = self.password_hasher.hash(&request.new_password)?;

        let updated = self
            .users
            .update(
                user.id,
                UserUpdate {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?;

        info!(user_id = user.id, "Password updated");
        Ok(updated)
    }

    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        principal: &Principal,
        request: UpdateProfileRequest,
    ) -> Result<User, AppError> {
        // Empty strings are treated as "leave unchanged", not "clear"
        let updated = self
            .users
            .update(
                principal.id,
                UserUpdate {
                    first_name: request.first_name.filter(|s| !s.is_empty()),
                    last_name: request.last_name.filter(|s| !s.is_empty()),
                    ..Default::default()
                },
            )
            .await?;

        Ok(updated)
    }

    /// Purge blacklist entries whose token has already expired
    pub async fn cleanup_expired_tokens(&self) -> Result<u64, AppError> {
        let removed = self.blacklist.cleanup_expired().await?;
        if removed > 0 {
            info!(removed, "Cleaned up expired blacklist entries");
        }
        Ok(removed)
    }

    async fn require_user(&self, id: i64) -> Result<User, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::authentication("User not found or inactive"))
    }
}
