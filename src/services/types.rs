use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Wire protocol types ────────────────────────────────────────

/// Sender/receiver reference as it appears on the wire. The relay is
/// inconsistent: some payloads carry bare id strings, others carry the
/// populated relation object. This enum is the only place both shapes
/// exist; everything past the normalizer sees plain id strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartyRef {
    Id(String),
    Relation(PartyRelation),
}

impl PartyRef {
    pub fn id(&self) -> &str {
        match self {
            PartyRef::Id(id) => id,
            PartyRef::Relation(rel) => &rel.id,
        }
    }
}

/// Populated relation object (`{ "_id": "..." }`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyRelation {
    #[serde(rename = "_id")]
    pub id: String,
}

/// Inbound `privateMessage` payload, shape-tolerant. Live events and
/// the unread-history fetch both decode into this.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawPrivateMessage {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub sender_id: Option<PartyRef>,
    #[serde(default)]
    pub sender: Option<PartyRef>,
    #[serde(default)]
    pub receiver_id: Option<PartyRef>,
    #[serde(default)]
    pub receiver: Option<PartyRef>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Outbound `privateMessage` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPrivateMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
}

/// Directory entry as returned by `/users` and `/users/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

// ── Stored types ───────────────────────────────────────────────

/// The locally authenticated user for the session. Obtained once from
/// `/validate`; immutable for the session's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
}

/// Canonical message record. `id` is `None` for optimistic entries
/// composed locally; when present it is the durable identity used for
/// deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Option<String>,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Two messages belong to the same conversation iff their
    /// sender/receiver pair equals `{a, b}` as an unordered set.
    pub fn same_pair(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

/// A conversation counterpart with its derived unread count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub id: String,
    pub username: String,
    pub unread_count: u32,
}

/// Events pushed to the embedding application (UI layer).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    MessageReceived(ChatMessage),
    UnreadChanged(HashMap<String, u32>),
}
