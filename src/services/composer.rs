//! Message Composer — validates outgoing text and builds the optimistic
//! local record. All preconditions are checked before any side effect;
//! a rejection performs no store mutation and no network call.

use chrono::Utc;

use super::types::ChatMessage;
use crate::error::{ChitChatError, Result};

/// Build an optimistic outgoing message. Requires a selected peer and
/// non-blank text; the result carries `id = None` (no durable identity
/// until the server echo) and `created_at = now`.
pub fn compose(
    text: &str,
    self_id: &str,
    selected_peer: Option<&str>,
) -> Result<ChatMessage> {
    let peer = selected_peer.ok_or_else(|| {
        ChitChatError::ValidationError("No peer selected".to_string())
    })?;

    if self_id.is_empty() {
        return Err(ChitChatError::ValidationError(
            "Local identity is not established".to_string(),
        ));
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChitChatError::ValidationError(
            "Message text is empty".to_string(),
        ));
    }

    Ok(ChatMessage {
        id: None,
        sender_id: self_id.to_string(),
        receiver_id: peer.to_string(),
        text: trimmed.to_string(),
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_compose_builds_optimistic_message() {
        let msg = compose("hello there", "u1", Some("u2")).unwrap();
        assert!(msg.id.is_none());
        assert_eq!(msg.sender_id, "u1");
        assert_eq!(msg.receiver_id, "u2");
        assert_eq!(msg.text, "hello there");
    }

    #[test]
    fn test_compose_trims_text() {
        let msg = compose("  hi  ", "u1", Some("u2")).unwrap();
        assert_eq!(msg.text, "hi");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn test_blank_text_rejected(#[case] text: &str) {
        let result = compose(text, "u1", Some("u2"));
        assert!(matches!(result, Err(ChitChatError::ValidationError(_))));
    }

    #[test]
    fn test_no_selected_peer_rejected() {
        let result = compose("hi", "u1", None);
        assert!(matches!(result, Err(ChitChatError::ValidationError(_))));
    }

    #[test]
    fn test_missing_identity_rejected() {
        let result = compose("hi", "", Some("u2"));
        assert!(matches!(result, Err(ChitChatError::ValidationError(_))));
    }
}
