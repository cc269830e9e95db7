//! JSON bodies of the MESSAGE frames the gateway delivers.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Presence transition delivered to a friend's `/user/queue/presence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    pub user_id: DbId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub online: bool,
    pub timestamp: Timestamp,
}

/// A persisted chat message fanned out to `/topic/conversations/<id>/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    pub id: DbId,
    pub conversation_id: DbId,
    pub sender_id: DbId,
    pub sender_username: String,
    pub content: String,
    pub created_at: Timestamp,
}

/// Typing indicator fanned out to `/topic/conversations/<id>/typing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub conversation_id: DbId,
    pub user_id: DbId,
    pub username: String,
    pub typing: bool,
}

/// Read receipt fanned out to `/topic/conversations/<id>/read-receipts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptEvent {
    pub conversation_id: DbId,
    pub user_id: DbId,
    pub username: String,
    pub read_at: Timestamp,
}

/// Reason a SUBSCRIBE or SEND was not applied, delivered to `/user/queue/errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionEvent {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}
