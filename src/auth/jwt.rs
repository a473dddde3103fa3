//! JWT token codec
//! Signs and verifies the access tokens carried by cookies and bearer headers

use crate::{
    config::AppConfig,
    error::AppError,
    models::user::{Principal, Role},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claim set carried in every access token: identity plus a snapshot of the
/// account flags at issue time. The middleware re-checks live status on every
/// request, so stale flags here can only narrow access, never widen it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_supporter: bool,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier, keyed by the revocation list)
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub.parse().map_err(|_| AppError::InvalidToken)
    }

    pub fn token_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.jti).map_err(|_| AppError::InvalidToken)
    }
}

/// JWT service: pure sign/verify, no storage. Revocation is the caller's
/// concern.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_exp_secs: u64,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("access_token_exp_secs", &self.access_token_exp_secs)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let secret = config.security.jwt_secret.expose_secret();

        // Ensure secret is at least 32 bytes for HS256. Config validation
        // already checks this; re-checking keeps the codec safe to construct
        // from any config value.
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_exp_secs: config.security.access_token_exp_secs,
        })
    }

    /// Issue a signed token for a principal with the configured lifetime
    pub fn issue(&self, principal: &Principal) -> Result<String, AppError> {
        self.issue_with_ttl(principal, self.access_token_exp_secs)
    }

    /// Issue a signed token with an explicit lifetime (seconds)
    pub fn issue_with_ttl(&self, principal: &Principal, ttl_secs: u64) -> Result<String, AppError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(ttl_secs as i64);

        let claims = Claims {
            sub: principal.id.to_string(),
            email: principal.email.clone(),
            first_name: principal.first_name.clone(),
            last_name: principal.last_name.clone(),
            role: principal.role,
            is_active: principal.is_active,
            is_verified: principal.is_verified,
            is_supporter: principal.is_supporter,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            AppError::Internal(format!("Failed to encode access token: {e}"))
        })
    }

    /// Verify signature and expiry, returning the claim set. Expired tokens
    /// and malformed/tampered tokens are distinct failures: clients may
    /// silently refresh on expiry but must hard-fail on tamper.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Exact expiry semantics, no clock leeway
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                tracing::debug!("Token expired");
                Err(AppError::TokenExpired)
            }
            Err(e) => {
                tracing::debug!("Token validation failed: {:?}", e);
                Err(AppError::InvalidToken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AppConfig, DatabaseConfig, LoggingConfig, RateLimitConfig, SecurityConfig, ServerConfig,
    };
    use secrecy::Secret;

    fn test_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                addr: "127.0.0.1:3000".to_string(),
                graceful_shutdown_timeout_secs: 30,
            },
            database: DatabaseConfig {
                url: Secret::new("postgresql://localhost/test".to_string()),
                max_connections: 5,
                min_connections: 1,
                acquire_timeout_secs: 5,
                idle_timeout_secs: 600,
                max_lifetime_secs: 1800,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
            security: SecurityConfig {
                jwt_secret: Secret::new("test-secret-key-for-testing-only-min-32-chars".to_string()),
                access_token_exp_secs: 3600,
                auth_cookie_name: "access_token".to_string(),
                csrf_cookie_name: "csrf_token".to_string(),
                csrf_header_name: "x-csrf-token".to_string(),
                cookie_secure: false,
                password_min_length: 8,
                password_require_lowercase: true,
                password_require_uppercase: true,
                password_require_digit: true,
                allowed_origin: None,
                trust_proxy: false,
                store_timeout_secs: 5,
            },
            rate_limit: RateLimitConfig {
                login_max_requests: 5,
                login_window_secs: 60,
                registration_max_requests: 3,
                registration_window_secs: 3600,
                credential_update_max_requests: 5,
                credential_update_window_secs: 3600,
                general_max_requests: 50,
                general_window_secs: 3600,
            },
        }
    }

    fn test_principal() -> Principal {
        Principal {
            id: 42,
            email: "a@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role: Role::User,
            is_active: true,
            is_verified: true,
            is_supporter: false,
        }
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let principal = test_principal();

        let token = service.issue(&principal).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.first_name, "Ada");
        assert_eq!(claims.role, Role::User);
        assert!(claims.is_active);
        assert!(claims.exp > claims.iat);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_each_token_gets_unique_jti() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let principal = test_principal();

        let a = service.verify(&service.issue(&principal).unwrap()).unwrap();
        let b = service.verify(&service.issue(&principal).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_expired_token_rejected_as_expired() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let principal = test_principal();

        // exp in the past; leeway is zero so this is already expired
        let token = service.issue_with_ttl(&principal, 0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));

        match service.verify(&token) {
            Err(AppError::TokenExpired) => {}
            other => panic!("expected TokenExpired, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_token_rejected_as_invalid() {
        let service = JwtService::from_config(&test_config()).unwrap();
        match service.verify("not.a.token") {
            Err(AppError::InvalidToken) => {}
            other => panic!("expected InvalidToken, got {other:?}"),
        }
    }

    #[test]
    fn test_token_signed_with_other_key_rejected() {
        let service = JwtService::from_config(&test_config()).unwrap();

        let mut other_config = test_config();
        other_config.security.jwt_secret =
            secrecy::Secret::new("another-secret-key-32-characters-long!!".to_string());
        let other = JwtService::from_config(&other_config).unwrap();

        let token = other.issue(&test_principal()).unwrap();
        match service.verify(&token) {
            Err(AppError::InvalidToken) => {}
            other => panic!("expected InvalidToken, got {other:?}"),
        }
    }

    #[test]
    fn test_short_secret_is_configuration_error() {
        let mut config = test_config();
        config.security.jwt_secret = secrecy::Secret::new("short".to_string());

        match JwtService::from_config(&config) {
            Err(AppError::Config(_)) => {}
            other => panic!("expected Config error, got {other:?}"),
        }
    }
}
