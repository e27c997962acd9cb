//! Core session orchestrator — ties together the connection, store,
//! derived views, and composer, and routes inbound transport events
//! through one serialized mutation path.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use super::composer;
use super::connection::{
    ConnectionManager, EventHandler, EVENT_CONNECT, EVENT_DISCONNECT,
};
use super::conversation::conversation_view;
use super::directory::DirectoryClient;
use super::message_store::MessageStore;
use super::normalizer;
use super::types::{
    ChatMessage, OutgoingPrivateMessage, Peer, RawPrivateMessage, SessionEvent, UserIdentity,
};
use super::unread::UnreadTracker;
use crate::error::{ChitChatError, Result};

/// One private-messaging session: the local identity, the append-only
/// message log, the peer-selection state machine, and the unread
/// tracker. State lives for the session and is discarded with it.
pub struct ChatSession {
    identity: UserIdentity,
    connection: Arc<ConnectionManager>,
    store: MessageStore,
    unread: UnreadTracker,
    selected_peer: Option<String>,
    /// Event sink for the embedding UI (set after construction).
    event_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl ChatSession {
    pub fn new(identity: UserIdentity, connection: Arc<ConnectionManager>) -> Self {
        Self {
            identity,
            connection,
            store: MessageStore::new(),
            unread: UnreadTracker::new(),
            selected_peer: None,
            event_tx: None,
        }
    }

    pub fn set_event_sink(&mut self, tx: mpsc::UnboundedSender<SessionEvent>) {
        self.event_tx = Some(tx);
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn selected_peer(&self) -> Option<&str> {
        self.selected_peer.as_deref()
    }

    // ── Peer selection ─────────────────────────────────────────

    /// Selection transition to `peer_id`. Resets that peer's unread
    /// count and supersedes the previous derived view; switching from
    /// another peer is the same transition with no intermediate
    /// observable state.
    pub fn select_peer(&mut self, peer_id: &str) {
        self.selected_peer = Some(peer_id.to_string());
        self.unread.select(peer_id);
        self.emit(SessionEvent::UnreadChanged(self.unread.counts()));
    }

    pub fn clear_selection(&mut self) {
        self.selected_peer = None;
    }

    // ── Derived views ──────────────────────────────────────────

    /// The conversation with the currently selected peer, recomputed
    /// from the store snapshot on every read.
    pub fn conversation(&self) -> Vec<ChatMessage> {
        conversation_view(self.store.all(), &self.identity.id, self.selected_peer())
    }

    pub fn unread_count(&self, peer_id: &str) -> u32 {
        self.unread.count(peer_id)
    }

    pub fn unread_counts(&self) -> HashMap<String, u32> {
        self.unread.counts()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    // ── Outgoing ───────────────────────────────────────────────

    /// Compose and send a message to the selected peer: validate,
    /// insert optimistically for instant feedback, then emit over the
    /// transport. Validation failures perform no mutation and no
    /// network call. A transport failure keeps the optimistic entry
    /// and surfaces so the caller can show a disconnected indicator.
    pub async fn send_message(&mut self, text: &str) -> Result<ChatMessage> {
        let message = composer::compose(text, &self.identity.id, self.selected_peer())?;

        self.store.append_optimistic(message.clone());

        let payload = OutgoingPrivateMessage {
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            text: message.text.clone(),
        };
        let payload = serde_json::to_value(&payload)
            .map_err(|e| ChitChatError::ValidationError(format!("Encode message: {}", e)))?;

        self.connection.send("privateMessage", payload).await?;
        Ok(message)
    }

    // ── Inbound ────────────────────────────────────────────────

    /// Merge an inbound `privateMessage` payload into the store.
    /// Duplicates and reconciled echoes return `Ok(None)`; only a
    /// genuinely new message from a counterpart feeds the unread
    /// tracker (never our own sends) and reaches the event sink.
    pub fn handle_incoming(&mut self, payload: Value) -> Result<Option<ChatMessage>> {
        let raw: RawPrivateMessage = serde_json::from_value(payload).map_err(|e| {
            ChitChatError::NormalizationFailure(format!("Undecodable payload: {}", e))
        })?;

        let Some(message) = self.store.append_incoming(raw)? else {
            return Ok(None);
        };

        if message.sender_id != self.identity.id
            && self
                .unread
                .record_incoming(&message.sender_id, self.selected_peer.as_deref())
        {
            self.emit(SessionEvent::UnreadChanged(self.unread.counts()));
        }

        self.emit(SessionEvent::MessageReceived(message.clone()));
        Ok(Some(message))
    }

    /// Load the unread backlog fetched over HTTP. Entries that fail
    /// normalization are logged and dropped without corrupting the
    /// store. Unread counts are untouched: the tracker's only
    /// transitions are live inbound increments and selection resets.
    pub fn load_unread_history(&mut self, raw_messages: Vec<RawPrivateMessage>) {
        let canonical: Vec<ChatMessage> = raw_messages
            .into_iter()
            .filter_map(|raw| match normalizer::normalize(raw) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    log::warn!("Dropping unread history entry: {}", e);
                    None
                }
            })
            .collect();
        self.store.load_history(canonical);
    }

    // ── Directory ──────────────────────────────────────────────

    /// Directory listing with the local user excluded and each peer
    /// annotated with its derived unread count. A fetch failure
    /// degrades to the empty list.
    pub async fn list_peers(
        &self,
        directory: &DirectoryClient,
        username_filter: Option<&str>,
    ) -> Vec<Peer> {
        let users = match directory.list_users(username_filter).await {
            Ok(users) => users,
            Err(e) => {
                log::warn!("Directory listing degraded to empty: {}", e);
                return Vec::new();
            }
        };

        users
            .into_iter()
            .filter(|u| u.id != self.identity.id)
            .map(|u| Peer {
                unread_count: self.unread.count(&u.id),
                id: u.id,
                username: u.username,
            })
            .collect()
    }
}

/// Routes transport events into the session through its lock — the
/// single serialized mutation path for all inbound traffic.
pub struct IncomingMessageAdapter {
    session: Arc<RwLock<ChatSession>>,
}

impl IncomingMessageAdapter {
    pub fn new(session: Arc<RwLock<ChatSession>>) -> Self {
        Self { session }
    }

    /// Subscribe the adapter to the events the session consumes.
    pub async fn attach(session: Arc<RwLock<ChatSession>>, connection: &ConnectionManager) {
        let adapter: Arc<dyn EventHandler> = Arc::new(Self::new(session));
        connection.subscribe("privateMessage", adapter.clone()).await;
        connection.subscribe(EVENT_CONNECT, adapter.clone()).await;
        connection.subscribe(EVENT_DISCONNECT, adapter).await;
    }
}

#[async_trait::async_trait]
impl EventHandler for IncomingMessageAdapter {
    async fn handle(&self, event: &str, payload: Value) {
        match event {
            "privateMessage" => {
                let mut session = self.session.write().await;
                if let Err(e) = session.handle_incoming(payload) {
                    log::warn!("Dropping inbound message: {}", e);
                }
            }
            EVENT_CONNECT => {
                let session = self.session.read().await;
                session.emit(SessionEvent::Connected);
            }
            EVENT_DISCONNECT => {
                let session = self.session.read().await;
                session.emit(SessionEvent::Disconnected);
            }
            other => log::debug!("Ignoring unhandled event {}", other),
        }
    }
}
