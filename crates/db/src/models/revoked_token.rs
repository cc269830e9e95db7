//! Revoked credential model and DTOs.

use socialchat_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `revoked_tokens` table.
#[derive(Debug, Clone, FromRow)]
pub struct RevokedToken {
    pub id: DbId,
    /// The credential's `jti` claim.
    pub token_id: String,
    pub user_id: DbId,
    /// When the credential would have expired on its own.
    pub expires_at: Timestamp,
    pub revoked_at: Timestamp,
}

/// DTO for recording a revocation.
#[derive(Debug, Clone)]
pub struct CreateRevokedToken {
    pub token_id: String,
    pub user_id: DbId,
    pub expires_at: Timestamp,
    pub revoked_at: Timestamp,
}
