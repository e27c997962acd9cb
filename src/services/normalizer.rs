//! Message Normalizer — the single boundary where heterogeneous inbound
//! shapes are reconciled into the canonical [`ChatMessage`]. No other
//! component may inspect raw payloads.

use chrono::Utc;

use super::types::{ChatMessage, PartyRef, RawPrivateMessage};
use crate::error::{ChitChatError, Result};

/// Canonicalize an inbound payload. Rejects when `text` is missing or
/// blank after trimming, when sender or receiver cannot be resolved
/// from either the bare-id or relation-object form, or when both
/// parties resolve to the same id.
pub fn normalize(raw: RawPrivateMessage) -> Result<ChatMessage> {
    let sender_id = resolve_party(&raw.sender_id, &raw.sender, "sender")?;
    let receiver_id = resolve_party(&raw.receiver_id, &raw.receiver, "receiver")?;

    if sender_id == receiver_id {
        return Err(ChitChatError::NormalizationFailure(format!(
            "Sender and receiver are the same party: {}",
            sender_id
        )));
    }

    let text = raw
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ChitChatError::NormalizationFailure("Missing or blank text".to_string())
        })?
        .to_string();

    Ok(ChatMessage {
        id: raw.id,
        sender_id,
        receiver_id,
        text,
        created_at: raw.created_at.unwrap_or_else(Utc::now),
    })
}

fn resolve_party(
    bare: &Option<PartyRef>,
    relation: &Option<PartyRef>,
    role: &str,
) -> Result<String> {
    bare.as_ref()
        .or(relation.as_ref())
        .map(|p| p.id().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ChitChatError::NormalizationFailure(format!("Unresolvable {} reference", role))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::types::PartyRelation;

    fn raw(json: serde_json::Value) -> RawPrivateMessage {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_bare_id_shape() {
        let msg = normalize(raw(serde_json::json!({
            "senderId": "u2",
            "receiverId": "u1",
            "text": "hi"
        })))
        .unwrap();
        assert_eq!(msg.sender_id, "u2");
        assert_eq!(msg.receiver_id, "u1");
        assert_eq!(msg.text, "hi");
        assert!(msg.id.is_none());
    }

    #[test]
    fn test_relation_object_shape() {
        let msg = normalize(raw(serde_json::json!({
            "_id": "m1",
            "sender": { "_id": "u2" },
            "receiver": { "_id": "u1" },
            "text": "yo",
            "createdAt": "2025-03-01T12:00:00Z"
        })))
        .unwrap();
        assert_eq!(msg.id.as_deref(), Some("m1"));
        assert_eq!(msg.sender_id, "u2");
        assert_eq!(msg.receiver_id, "u1");
    }

    #[test]
    fn test_mixed_shapes() {
        let msg = normalize(raw(serde_json::json!({
            "senderId": "u2",
            "receiver": { "_id": "u1" },
            "text": "mixed"
        })))
        .unwrap();
        assert_eq!(msg.sender_id, "u2");
        assert_eq!(msg.receiver_id, "u1");
    }

    #[test]
    fn test_blank_text_rejected() {
        let result = normalize(raw(serde_json::json!({
            "senderId": "u2",
            "receiverId": "u1",
            "text": "   "
        })));
        assert!(matches!(
            result,
            Err(ChitChatError::NormalizationFailure(_))
        ));
    }

    #[test]
    fn test_missing_receiver_rejected() {
        let result = normalize(raw(serde_json::json!({
            "senderId": "u2",
            "text": "hi"
        })));
        assert!(matches!(
            result,
            Err(ChitChatError::NormalizationFailure(_))
        ));
    }

    #[test]
    fn test_self_addressed_rejected() {
        let result = normalize(RawPrivateMessage {
            sender_id: Some(PartyRef::Id("u1".to_string())),
            receiver: Some(PartyRef::Relation(PartyRelation {
                id: "u1".to_string(),
            })),
            text: Some("echo chamber".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(ChitChatError::NormalizationFailure(_))
        ));
    }

    #[test]
    fn test_text_is_trimmed() {
        let msg = normalize(raw(serde_json::json!({
            "senderId": "u2",
            "receiverId": "u1",
            "text": "  padded  "
        })))
        .unwrap();
        assert_eq!(msg.text, "padded");
    }

    #[test]
    fn test_missing_created_at_defaults_to_now() {
        let before = Utc::now();
        let msg = normalize(raw(serde_json::json!({
            "senderId": "u2",
            "receiverId": "u1",
            "text": "hi"
        })))
        .unwrap();
        assert!(msg.created_at >= before);
    }
}
