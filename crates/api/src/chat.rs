//! Consumer of admitted SEND frames.
//!
//! The authorizer has already checked membership and the rate budget; this
//! module validates the payload, persists, and fans out to the conversation
//! topics. Failures are reported to the sender's `/user/queue/errors` only.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use socialchat_core::chat::{validate_message_content, MessagePayload, TypingPayload};
use socialchat_core::destination::{
    conversation_messages_topic, conversation_read_receipts_topic, conversation_typing_topic,
    ChatAction, ERRORS_QUEUE,
};
use socialchat_core::error::CoreError;
use socialchat_core::events::{ChatMessageEvent, ReadReceiptEvent, RejectionEvent, TypingEvent};
use socialchat_core::types::DbId;

use crate::gateway::Principal;
use crate::lookup::{with_timeout, LookupError, MessageStore};
use crate::ws::WsManager;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Malformed payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("Message store failure: {0}")]
    Store(#[from] LookupError),
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::InvalidPayload(_) => "INVALID_PAYLOAD",
            DispatchError::Validation(_) => "VALIDATION_ERROR",
            DispatchError::Store(_) => "DELIVERY_FAILED",
        }
    }

    /// Text shown to the sender; store details stay in the logs.
    fn client_message(&self) -> String {
        match self {
            DispatchError::Store(_) => "Message could not be delivered".to_string(),
            other => other.to_string(),
        }
    }
}

pub struct ChatDispatcher {
    messages: Arc<dyn MessageStore>,
    ws_manager: Arc<WsManager>,
    lookup_timeout: Duration,
}

impl ChatDispatcher {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        ws_manager: Arc<WsManager>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            messages,
            ws_manager,
            lookup_timeout,
        }
    }

    /// Handle one admitted SEND. Returns the number of deliveries made.
    ///
    /// On failure the sender is told on its errors queue and the error is
    /// returned for logging.
    pub async fn dispatch(
        &self,
        principal: &Principal,
        conversation_id: DbId,
        action: ChatAction,
        body: &str,
    ) -> Result<usize, DispatchError> {
        let result = match action {
            ChatAction::Message => self.post_message(principal, conversation_id, body).await,
            ChatAction::Typing => self.typing(principal, conversation_id, body).await,
            ChatAction::Read => self.mark_read(principal, conversation_id).await,
        };

        if let Err(e) = &result {
            tracing::warn!(
                user_id = principal.user_id,
                conversation_id,
                error = %e,
                "Chat dispatch failed"
            );
            self.report(principal.user_id, conversation_id, e).await;
        }
        result
    }

    async fn post_message(
        &self,
        principal: &Principal,
        conversation_id: DbId,
        body: &str,
    ) -> Result<usize, DispatchError> {
        let payload: MessagePayload = serde_json::from_str(body)?;
        let content = validate_message_content(payload.content.as_deref())?;

        let message = with_timeout(
            self.lookup_timeout,
            self.messages
                .append(conversation_id, principal.user_id, content),
        )
        .await?;

        let event = ChatMessageEvent {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender_username: principal.username.clone(),
            content: message.content,
            created_at: message.created_at,
        };
        let delivered = self
            .ws_manager
            .publish(
                &conversation_messages_topic(conversation_id),
                &serde_json::to_string(&event)?,
            )
            .await;
        tracing::debug!(
            message_id = event.id,
            conversation_id,
            delivered,
            "Chat message delivered"
        );
        Ok(delivered)
    }

    async fn typing(
        &self,
        principal: &Principal,
        conversation_id: DbId,
        body: &str,
    ) -> Result<usize, DispatchError> {
        let payload: TypingPayload = if body.trim().is_empty() {
            TypingPayload { typing: true }
        } else {
            serde_json::from_str(body)?
        };
        let event = TypingEvent {
            conversation_id,
            user_id: principal.user_id,
            username: principal.username.clone(),
            typing: payload.typing,
        };
        Ok(self
            .ws_manager
            .publish(
                &conversation_typing_topic(conversation_id),
                &serde_json::to_string(&event)?,
            )
            .await)
    }

    async fn mark_read(
        &self,
        principal: &Principal,
        conversation_id: DbId,
    ) -> Result<usize, DispatchError> {
        let read_at = Utc::now();
        with_timeout(
            self.lookup_timeout,
            self.messages
                .mark_read(conversation_id, principal.user_id, read_at),
        )
        .await?;

        let event = ReadReceiptEvent {
            conversation_id,
            user_id: principal.user_id,
            username: principal.username.clone(),
            read_at,
        };
        Ok(self
            .ws_manager
            .publish(
                &conversation_read_receipts_topic(conversation_id),
                &serde_json::to_string(&event)?,
            )
            .await)
    }

    async fn report(&self, user_id: DbId, conversation_id: DbId, error: &DispatchError) {
        let event = RejectionEvent {
            code: error.code().to_string(),
            message: error.client_message(),
            destination: Some(format!("/app/chat/{conversation_id}")),
        };
        match serde_json::to_string(&event) {
            Ok(body) => {
                self.ws_manager
                    .send_to_user(user_id, ERRORS_QUEUE, &body)
                    .await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize rejection event"),
        }
    }
}
