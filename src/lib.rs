//! ChitChat client core — the stateful heart of a one-to-one private
//! messaging client: transport session lifecycle, identity
//! registration, an append-only message log, and the derived
//! per-conversation and unread views computed from it.

pub mod error;
pub mod services;

pub use error::{ChitChatError, Result};
pub use services::config::ClientConfig;
pub use services::connection::{ConnectionManager, CredentialsMode, EventHandler};
pub use services::directory::{DirectoryClient, SearchQuery};
pub use services::registrar::IdentityRegistrar;
pub use services::session::{ChatSession, IncomingMessageAdapter};
pub use services::types::{
    ChatMessage, Peer, RawPrivateMessage, SessionEvent, UserIdentity,
};
