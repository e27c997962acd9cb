// Service layer - one module per session component

pub mod composer;
pub mod config;
pub mod connection;
pub mod conversation;
pub mod directory;
pub mod message_store;
pub mod normalizer;
pub mod registrar;
pub mod session;
pub mod types;
pub mod unread;

pub use config::ClientConfig;
pub use connection::{ConnectionManager, CredentialsMode, EventHandler};
pub use conversation::conversation_view;
pub use directory::{DirectoryClient, SearchQuery};
pub use message_store::MessageStore;
pub use registrar::IdentityRegistrar;
pub use session::{ChatSession, IncomingMessageAdapter};
pub use unread::UnreadTracker;
