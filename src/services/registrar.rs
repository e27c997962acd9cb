//! Identity Registrar — binds the local identity to the active
//! transport session so the relay can route messages to it. The relay
//! associates routing by session, not by a global table, so the
//! `register` event must re-fire on every session establishment.

use serde_json::Value;
use std::sync::Arc;

use super::connection::{ConnectionManager, EventHandler, EVENT_CONNECT};

/// Announces the local user id on every synthetic `connect` event.
pub struct IdentityRegistrar {
    connection: Arc<ConnectionManager>,
    user_id: String,
}

impl IdentityRegistrar {
    pub fn new(connection: Arc<ConnectionManager>, user_id: String) -> Self {
        Self {
            connection,
            user_id,
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for IdentityRegistrar {
    async fn handle(&self, event: &str, _payload: Value) {
        if event != EVENT_CONNECT {
            return;
        }
        match self
            .connection
            .send("register", Value::String(self.user_id.clone()))
            .await
        {
            Ok(()) => log::info!("Registered identity {} with relay", self.user_id),
            Err(e) => log::warn!("Identity registration failed: {}", e),
        }
    }
}
