//! Destination path grammar for SUBSCRIBE and SEND frames.
//!
//! Every destination a client may name is classified into a closed
//! [`Destination`] variant. Anything outside the grammar becomes
//! [`Destination::Unknown`] and is rejected by the gateway.
//!
//! ```text
//! /user/queue/<anything>                                  private queue
//! /topic/presence                                         public presence (always rejected)
//! /topic/notifications...                                 deprecated public notifications
//! /topic/conversations/<id>[/messages|/typing|/read-receipts]
//! /app/chat/<id>[/message|/typing|/read]
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Well-known destinations
// ---------------------------------------------------------------------------

/// Prefix of private per-user queues.
pub const PRIVATE_QUEUE_PREFIX: &str = "/user/queue/";

/// The retired public presence topic.
pub const PUBLIC_PRESENCE_TOPIC: &str = "/topic/presence";

/// Prefix of the deprecated public notifications topic.
pub const DEPRECATED_NOTIFICATIONS_PREFIX: &str = "/topic/notifications";

/// Private queue that receives presence transitions of friends.
pub const PRESENCE_QUEUE: &str = "/user/queue/presence";

/// Private queue that receives per-frame rejection reasons.
pub const ERRORS_QUEUE: &str = "/user/queue/errors";

static PRIVATE_QUEUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/user/queue/.+$").expect("valid regex"));

static CONVERSATION_TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/topic/conversations/(\d+)(/messages|/typing|/read-receipts)?$")
        .expect("valid regex")
});

static CHAT_SEND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/app/chat/(\d+)(/message|/typing|/read)?$").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Sub-channel of a conversation topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationChannel {
    /// `/topic/conversations/<id>` with no suffix.
    All,
    Messages,
    Typing,
    ReadReceipts,
}

/// Action requested by a SEND to `/app/chat/<id>/...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatAction {
    Message,
    Typing,
    Read,
}

/// A classified destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    PrivateQueue,
    PublicPresence,
    DeprecatedNotifications,
    ConversationTopic {
        conversation_id: DbId,
        channel: ConversationChannel,
    },
    ChatSend {
        conversation_id: DbId,
        action: ChatAction,
    },
    Unknown,
}

impl Destination {
    /// Classify a raw destination string.
    ///
    /// Evaluation order matters: the private queue is matched first, then the
    /// exact public presence topic, then the deprecated notifications prefix.
    pub fn parse(raw: &str) -> Self {
        if PRIVATE_QUEUE_RE.is_match(raw) {
            return Destination::PrivateQueue;
        }
        if raw == PUBLIC_PRESENCE_TOPIC {
            return Destination::PublicPresence;
        }
        if raw.starts_with(DEPRECATED_NOTIFICATIONS_PREFIX) {
            return Destination::DeprecatedNotifications;
        }
        if let Some(caps) = CONVERSATION_TOPIC_RE.captures(raw) {
            let Some(conversation_id) = parse_id(&caps[1]) else {
                return Destination::Unknown;
            };
            let channel = match caps.get(2).map(|m| m.as_str()) {
                None => ConversationChannel::All,
                Some("/messages") => ConversationChannel::Messages,
                Some("/typing") => ConversationChannel::Typing,
                Some(_) => ConversationChannel::ReadReceipts,
            };
            return Destination::ConversationTopic {
                conversation_id,
                channel,
            };
        }
        if let Some(caps) = CHAT_SEND_RE.captures(raw) {
            let Some(conversation_id) = parse_id(&caps[1]) else {
                return Destination::Unknown;
            };
            // The bare `/app/chat/<id>` form posts a message.
            let action = match caps.get(2).map(|m| m.as_str()) {
                None | Some("/message") => ChatAction::Message,
                Some("/typing") => ChatAction::Typing,
                Some(_) => ChatAction::Read,
            };
            return Destination::ChatSend {
                conversation_id,
                action,
            };
        }
        Destination::Unknown
    }
}

/// Ids are positive BIGSERIAL values; anything that overflows is not an id.
fn parse_id(digits: &str) -> Option<DbId> {
    digits.parse::<DbId>().ok().filter(|id| *id > 0)
}

/// Topic that carries chat messages of a conversation.
pub fn conversation_messages_topic(conversation_id: DbId) -> String {
    format!("/topic/conversations/{conversation_id}/messages")
}

/// Topic that carries typing indicators of a conversation.
pub fn conversation_typing_topic(conversation_id: DbId) -> String {
    format!("/topic/conversations/{conversation_id}/typing")
}

/// Topic that carries read receipts of a conversation.
pub fn conversation_read_receipts_topic(conversation_id: DbId) -> String {
    format!("/topic/conversations/{conversation_id}/read-receipts")
}
