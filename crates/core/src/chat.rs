//! Chat message payloads and content validation.
//!
//! Message content is validated once, in the dispatcher that consumes
//! admitted SEND frames.

use serde::Deserialize;

use crate::error::CoreError;

/// Maximum length of a chat message in characters.
pub const MAX_MESSAGE_LENGTH: usize = 5_000;

/// Body of a SEND to `/app/chat/<id>/message`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub content: Option<String>,
}

/// Body of a SEND to `/app/chat/<id>/typing`.
#[derive(Debug, Clone, Deserialize)]
pub struct TypingPayload {
    #[serde(default)]
    pub typing: bool,
}

/// Validate message content: non-blank and within [`MAX_MESSAGE_LENGTH`].
///
/// Returns the content unchanged (surrounding whitespace is preserved).
pub fn validate_message_content(content: Option<&str>) -> Result<&str, CoreError> {
    let content = content.unwrap_or_default();
    if content.trim().is_empty() {
        return Err(CoreError::Validation(
            "Message content cannot be empty".to_string(),
        ));
    }
    let length = content.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Message must not exceed {MAX_MESSAGE_LENGTH} characters (got {length})"
        )));
    }
    Ok(content)
}
