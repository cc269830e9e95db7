//! Registry of credentials revoked before their natural expiry.
//!
//! The durable store is the source of truth; no "not revoked" answer is
//! cached. Every failure on the lookup path is reported as revoked.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use socialchat_core::types::{DbId, Timestamp};
use socialchat_db::models::revoked_token::CreateRevokedToken;

use crate::auth::jwt::Claims;
use crate::lookup::{with_timeout, LookupError, RevocationStore};

pub struct RevocationRegistry {
    store: Arc<dyn RevocationStore>,
    lookup_timeout: Duration,
}

impl RevocationRegistry {
    pub fn new(store: Arc<dyn RevocationStore>, lookup_timeout: Duration) -> Self {
        Self {
            store,
            lookup_timeout,
        }
    }

    /// Whether the credential id must be refused.
    ///
    /// A blank id, a store error, or a timeout all count as revoked.
    pub async fn is_revoked(&self, token_id: &str) -> bool {
        if token_id.trim().is_empty() {
            return true;
        }
        match with_timeout(self.lookup_timeout, self.store.exists(token_id)).await {
            Ok(revoked) => revoked,
            Err(e) => {
                tracing::error!(error = %e, "Revocation lookup failed; treating token as revoked");
                true
            }
        }
    }

    /// Revoke the credential described by `claims` on behalf of `user_id`.
    ///
    /// Idempotent: returns `Ok(false)` when the id was already revoked or the
    /// claims carry no id.
    pub async fn revoke(&self, claims: &Claims, user_id: DbId) -> Result<bool, LookupError> {
        if claims.jti.trim().is_empty() {
            tracing::warn!(user_id, "Skipping revocation of a token without jti");
            return Ok(false);
        }

        let input = CreateRevokedToken {
            token_id: claims.jti.clone(),
            user_id,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC),
            revoked_at: Utc::now(),
        };
        let created = with_timeout(self.lookup_timeout, self.store.insert(&input)).await?;
        if created {
            tracing::info!(user_id, token_id = %input.token_id, "Token revoked");
        } else {
            tracing::debug!(user_id, token_id = %input.token_id, "Token already revoked");
        }
        Ok(created)
    }

    /// Forget revocations whose natural expiry has passed.
    pub async fn cleanup_expired(&self) -> Result<u64, LookupError> {
        self.cleanup_expired_at(Utc::now()).await
    }

    pub async fn cleanup_expired_at(&self, now: Timestamp) -> Result<u64, LookupError> {
        with_timeout(self.lookup_timeout, self.store.delete_expired(now)).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::auth::jwt::TokenKind;
    use crate::lookup::memory::InMemoryStore;

    fn claims(jti: &str, exp: i64) -> Claims {
        Claims {
            jti: jti.to_string(),
            sub: 7,
            username: "alice".into(),
            roles: vec![],
            token_type: TokenKind::Access,
            iat: exp - 900,
            exp,
        }
    }

    fn registry(store: Arc<InMemoryStore>) -> RevocationRegistry {
        RevocationRegistry::new(store, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn blank_id_is_revoked() {
        let registry = registry(Arc::new(InMemoryStore::new()));
        assert!(registry.is_revoked("").await);
        assert!(registry.is_revoked("   ").await);
        assert!(!registry.is_revoked("fresh").await);
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let registry = registry(Arc::new(InMemoryStore::new()));
        let exp = Utc::now().timestamp() + 600;

        assert!(registry.revoke(&claims("jti-1", exp), 7).await.unwrap());
        assert!(!registry.revoke(&claims("jti-1", exp), 7).await.unwrap());
        assert!(registry.is_revoked("jti-1").await);
        assert!(registry.is_revoked("jti-1").await);
    }

    #[tokio::test]
    async fn claims_without_jti_are_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let registry = registry(store.clone());
        assert!(!registry.revoke(&claims("", 1_000), 7).await.unwrap());
        assert_eq!(store.revoked_count(), 0);
    }

    #[tokio::test]
    async fn cleanup_forgets_only_naturally_expired_entries() {
        let registry = registry(Arc::new(InMemoryStore::new()));
        let now = Utc::now();
        registry
            .revoke(&claims("old", now.timestamp() - 60), 7)
            .await
            .unwrap();
        registry
            .revoke(&claims("live", now.timestamp() + 600), 7)
            .await
            .unwrap();

        assert_eq!(registry.cleanup_expired_at(now).await.unwrap(), 1);
        assert!(!registry.is_revoked("old").await);
        assert!(registry.is_revoked("live").await);
    }

    #[tokio::test]
    async fn store_outage_fails_closed() {
        let store = Arc::new(InMemoryStore::new());
        let registry = registry(store.clone());
        store.set_unavailable(true);

        assert!(registry.is_revoked("never-revoked").await);
        assert_matches!(
            registry.revoke(&claims("x", 1_000), 7).await,
            Err(LookupError::Unavailable(_))
        );
    }

    #[tokio::test]
    async fn slow_store_fails_closed() {
        let store = Arc::new(InMemoryStore::new());
        store.set_latency(Duration::from_secs(2));
        let registry = RevocationRegistry::new(store, Duration::from_millis(20));

        assert!(registry.is_revoked("never-revoked").await);
    }
}
