//! Unread Tracker — derived mapping from peer id to count of unseen
//! messages. Exactly two transitions exist: an accepted inbound message
//! from a non-selected peer increments that peer's count, and selecting
//! a peer resets that peer's count to zero.

use std::collections::HashMap;

/// Per-peer unread counts, default 0.
#[derive(Debug, Default)]
pub struct UnreadTracker {
    counts: HashMap<String, u32>,
}

impl UnreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted inbound message. Increments the sender's
    /// count unless the sender is the currently selected peer. Returns
    /// whether a count changed. Callers must not route the local user's
    /// own (echoed) messages here.
    pub fn record_incoming(&mut self, sender_id: &str, selected_peer: Option<&str>) -> bool {
        if selected_peer == Some(sender_id) {
            return false;
        }
        *self.counts.entry(sender_id.to_string()).or_insert(0) += 1;
        true
    }

    /// Selection transition to `peer_id`: that peer's messages are now
    /// on screen, so its count resets. No other peer is affected.
    pub fn select(&mut self, peer_id: &str) {
        self.counts.insert(peer_id.to_string(), 0);
    }

    pub fn count(&self, peer_id: &str) -> u32 {
        self.counts.get(peer_id).copied().unwrap_or(0)
    }

    /// Snapshot of all non-zero counts.
    pub fn counts(&self) -> HashMap<String, u32> {
        self.counts
            .iter()
            .filter(|(_, &c)| c > 0)
            .map(|(id, &c)| (id.clone(), c))
            .collect()
    }
}
