//! Chat message model.

use serde::Serialize;
use socialchat_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `messages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Message {
    pub id: DbId,
    pub conversation_id: DbId,
    pub sender_id: DbId,
    pub content: String,
    pub created_at: Timestamp,
}
