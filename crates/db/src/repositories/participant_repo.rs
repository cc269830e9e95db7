//! Repository for the `conversation_participants` table.

use socialchat_core::types::{DbId, Timestamp};
use sqlx::PgPool;

/// Membership queries for conversations.
pub struct ParticipantRepo;

impl ParticipantRepo {
    /// Whether `user_id` participates in `conversation_id`.
    pub async fn is_member(
        pool: &PgPool,
        conversation_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM conversation_participants
                 WHERE conversation_id = $1 AND user_id = $2
             )",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Set `last_read_at` for a participant. Returns `true` if a row was updated.
    pub async fn update_last_read_at(
        pool: &PgPool,
        conversation_id: DbId,
        user_id: DbId,
        read_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE conversation_participants SET last_read_at = $3
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(read_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
