//! Repository for the `revoked_tokens` table.

use socialchat_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::revoked_token::CreateRevokedToken;

/// Provides insert, lookup and cleanup for revoked credential ids.
pub struct RevokedTokenRepo;

impl RevokedTokenRepo {
    /// Record a revocation. Idempotent: returns `false` when the token id was
    /// already present.
    pub async fn insert(pool: &PgPool, input: &CreateRevokedToken) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO revoked_tokens (token_id, user_id, expires_at, revoked_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (token_id) DO NOTHING",
        )
        .bind(&input.token_id)
        .bind(input.user_id)
        .bind(input.expires_at)
        .bind(input.revoked_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether a token id has been revoked.
    pub async fn exists(pool: &PgPool, token_id: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE token_id = $1)")
            .bind(token_id)
            .fetch_one(pool)
            .await
    }

    /// Delete records whose natural expiry is before `now`. Returns the count.
    pub async fn delete_expired(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
