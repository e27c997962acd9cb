//! Client configuration — endpoints, timeouts, and retry bounds.
//! Loaded from an optional `chitchat.toml` alongside `CHITCHAT_*`
//! environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ChitChatError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the collaborator HTTP API.
    pub api_url: String,
    /// WebSocket endpoint of the message relay.
    pub socket_url: String,
    /// Per-request timeout for HTTP calls, in seconds.
    pub request_timeout_secs: u64,
    /// Bounded-retry policy for opening the transport session.
    pub connect_max_attempts: u32,
    /// Initial reconnect backoff, doubled per attempt.
    pub connect_backoff_secs: u64,
    /// Bounded retry for directory/search/history fetches.
    pub directory_retry_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001".to_string(),
            socket_url: "ws://localhost:3001".to_string(),
            request_timeout_secs: 10,
            connect_max_attempts: 3,
            connect_backoff_secs: 2,
            directory_retry_attempts: 2,
        }
    }
}

impl ClientConfig {
    /// Load configuration, layering an optional TOML file and
    /// `CHITCHAT_*` environment variables over the defaults.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = ClientConfig::default();

        let mut builder = config::Config::builder()
            .set_default("api_url", defaults.api_url.clone())
            .and_then(|b| b.set_default("socket_url", defaults.socket_url.clone()))
            .and_then(|b| {
                b.set_default("request_timeout_secs", defaults.request_timeout_secs)
            })
            .and_then(|b| b.set_default("connect_max_attempts", defaults.connect_max_attempts))
            .and_then(|b| b.set_default("connect_backoff_secs", defaults.connect_backoff_secs))
            .and_then(|b| {
                b.set_default(
                    "directory_retry_attempts",
                    defaults.directory_retry_attempts,
                )
            })
            .map_err(|e| ChitChatError::ConfigError(format!("Config defaults: {}", e)))?;

        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path.to_path_buf()).required(false),
            );
        }

        builder
            .add_source(config::Environment::with_prefix("CHITCHAT"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ChitChatError::ConfigError(format!("Load config: {}", e)))
    }

    /// Persist the current configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = toml::to_string_pretty(self)
            .map_err(|e| ChitChatError::ConfigError(format!("Serialize config: {}", e)))?;
        std::fs::write(path, data)
            .map_err(|e| ChitChatError::ConfigError(format!("Write config: {}", e)))
    }
}
