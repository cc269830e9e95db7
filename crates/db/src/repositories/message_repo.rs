//! Repository for the `messages` table.

use socialchat_core::types::DbId;
use sqlx::PgPool;

use crate::models::message::Message;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, conversation_id, sender_id, content, created_at";

/// Persistence for chat messages.
pub struct MessageRepo;

impl MessageRepo {
    /// Append a message and bump the conversation's `updated_at`.
    pub async fn append(
        pool: &PgPool,
        conversation_id: DbId,
        sender_id: DbId,
        content: &str,
    ) -> Result<Message, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO messages (conversation_id, sender_id, content)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        let message = sqlx::query_as::<_, Message>(&query)
            .bind(conversation_id)
            .bind(sender_id)
            .bind(content)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }
}
