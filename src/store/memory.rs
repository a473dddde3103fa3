//! In-process token blacklist
//!
//! Suitable for single-instance deployments; revocations are visible to
//! every request handled by this process the moment `revoke` returns.

use super::TokenBlacklist;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryTokenBlacklist {
    entries: DashMap<Uuid, DateTime<Utc>>,
}

impl MemoryTokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for MemoryTokenBlacklist {
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        self.entries.insert(jti, expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, AppError> {
        Ok(self.entries.contains_key(&jti))
    }

    async fn cleanup_expired(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        Ok((before - self.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_revoke_then_lookup() {
        let blacklist = MemoryTokenBlacklist::new();
        let jti = Uuid::new_v4();

        assert!(!blacklist.is_revoked(jti).await.unwrap());

        blacklist
            .revoke(jti, Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        assert!(blacklist.is_revoked(jti).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let blacklist = MemoryTokenBlacklist::new();
        let jti = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::hours(1);

        blacklist.revoke(jti, expires_at).await.unwrap();
        blacklist.revoke(jti, expires_at).await.unwrap();

        assert!(blacklist.is_revoked(jti).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let blacklist = MemoryTokenBlacklist::new();
        let stale = Uuid::new_v4();
        let live = Uuid::new_v4();

        blacklist
            .revoke(stale, Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        blacklist
            .revoke(live, Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let removed = blacklist.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(!blacklist.is_revoked(stale).await.unwrap());
        assert!(blacklist.is_revoked(live).await.unwrap());
    }
}
