//! Message Store — the append-only ordered log of canonical messages,
//! the single source of truth for the session. Derived views (the
//! conversation view, unread counts) are recomputed from it and never
//! independently mutated.

use std::collections::HashSet;

use super::normalizer;
use super::types::{ChatMessage, RawPrivateMessage};
use crate::error::Result;

/// In-memory append-only message log. Insertion order is preserved;
/// the store never reorders by timestamp (chronological ordering is a
/// read-side concern). Discarded when the session ends.
pub struct MessageStore {
    messages: Vec<ChatMessage>,
    known_ids: HashSet<String>,
    version: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            known_ids: HashSet::new(),
            version: 0,
        }
    }

    /// Normalize and insert an inbound payload.
    ///
    /// Idempotent merge: a durable id already present is a no-op and
    /// returns `Ok(None)`. A durable message matching a pending
    /// optimistic entry (same sender, receiver, and text, `id == None`)
    /// adopts the durable id in place rather than inserting a second
    /// visible copy — this is how a server echo of our own send is
    /// reconciled. Only a genuinely new message is returned.
    pub fn append_incoming(&mut self, raw: RawPrivateMessage) -> Result<Option<ChatMessage>> {
        let message = normalizer::normalize(raw)?;

        if let Some(ref id) = message.id {
            if self.known_ids.contains(id) {
                log::debug!("Dropping duplicate message {}", id);
                return Ok(None);
            }

            if let Some(pending) = self.messages.iter_mut().find(|m| {
                m.id.is_none()
                    && m.sender_id == message.sender_id
                    && m.receiver_id == message.receiver_id
                    && m.text == message.text
            }) {
                log::debug!(
                    "Reconciled optimistic message to {} durable id {}",
                    message.receiver_id,
                    id
                );
                pending.id = Some(id.clone());
                self.known_ids.insert(id.clone());
                self.version += 1;
                return Ok(None);
            }

            self.known_ids.insert(id.clone());
        }

        self.messages.push(message.clone());
        self.version += 1;
        Ok(Some(message))
    }

    /// Insert a locally composed message before server acknowledgement.
    pub fn append_optimistic(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.version += 1;
    }

    /// Prepend a historical batch ahead of live entries, preserving the
    /// batch's own order and skipping durable ids already present.
    /// Append-order invariants for subsequently received live messages
    /// are unaffected.
    pub fn load_history(&mut self, messages: Vec<ChatMessage>) {
        let fresh: Vec<ChatMessage> = messages
            .into_iter()
            .filter(|m| match &m.id {
                Some(id) => self.known_ids.insert(id.clone()),
                None => true,
            })
            .collect();

        if fresh.is_empty() {
            return;
        }

        log::info!("Loaded {} historical messages", fresh.len());
        self.messages.splice(0..0, fresh);
        self.version += 1;
    }

    /// Read-only insertion-order snapshot.
    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Bumped on every mutation; memoization key for derived views.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}
