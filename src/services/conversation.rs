//! Conversation View — pure derivation of the per-peer message
//! subsequence from a store snapshot. Recomputed on read (linear scan,
//! no side effects), so no caching or invalidation protocol is needed.

use super::types::ChatMessage;

/// Messages exchanged between `self_id` and the selected peer, ordered
/// chronologically by `createdAt` with arrival order as the tie-break
/// (stable sort over the insertion-ordered snapshot). With no peer
/// selected the view is empty.
pub fn conversation_view(
    messages: &[ChatMessage],
    self_id: &str,
    peer_id: Option<&str>,
) -> Vec<ChatMessage> {
    let Some(peer) = peer_id else {
        return Vec::new();
    };

    let mut view: Vec<ChatMessage> = messages
        .iter()
        .filter(|m| m.same_pair(self_id, peer))
        .cloned()
        .collect();
    view.sort_by_key(|m| m.created_at);
    view
}
