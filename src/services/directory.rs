//! Directory client — thin wrappers over the collaborator HTTP
//! endpoints: session validation, user directory/search, unread-history
//! fetch, and conversation deletion. Consumed, never reimplemented.

use serde::Deserialize;
use std::time::Duration;

use super::types::{DirectoryUser, RawPrivateMessage, UserIdentity};
use crate::error::{ChitChatError, Result};

/// Directory search form: the dashboard searches by username, the
/// search service by email.
#[derive(Debug, Clone)]
pub enum SearchQuery {
    Username(String),
    Email(String),
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<DirectoryUser>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<RawPrivateMessage>,
}

/// HTTP client for the collaborator API. Failures map to
/// `DirectoryFetchFailure` and callers degrade to the empty or previous
/// result set; reads retry within a configured bound, mutations do not.
pub struct DirectoryClient {
    client: reqwest::Client,
    base_url: String,
    retry_attempts: u32,
}

impl DirectoryClient {
    /// `session_cookie` is the credential obtained at login; it rides
    /// along on every request, mirroring the browser's
    /// `credentials: "include"` fetches.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        retry_attempts: u32,
        session_cookie: Option<&str>,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(cookie) = session_cookie {
            let value = reqwest::header::HeaderValue::from_str(cookie).map_err(|e| {
                ChitChatError::DirectoryFetchFailure(format!("Invalid session cookie: {}", e))
            })?;
            headers.insert(reqwest::header::COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                ChitChatError::DirectoryFetchFailure(format!("HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_attempts: retry_attempts.max(1),
        })
    }

    /// Validate the session credential and fetch the local identity.
    /// 401 propagates as `AuthenticationRequired` (caller redirects to
    /// login); this is never retried.
    pub async fn validate(&self) -> Result<UserIdentity> {
        let url = format!("{}/validate", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(|e| {
            ChitChatError::DirectoryFetchFailure(format!("Validate request: {}", e))
        })?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ChitChatError::AuthenticationRequired);
        }
        if !resp.status().is_success() {
            return Err(ChitChatError::DirectoryFetchFailure(format!(
                "Validate failed: HTTP {}",
                resp.status()
            )));
        }

        resp.json::<UserIdentity>().await.map_err(|e| {
            ChitChatError::DirectoryFetchFailure(format!("Parse identity: {}", e))
        })
    }

    /// Directory listing, optionally filtered by username prefix. The
    /// caller excludes the local user.
    pub async fn list_users(&self, username: Option<&str>) -> Result<Vec<DirectoryUser>> {
        let url = match username {
            Some(name) => format!(
                "{}/users?username={}",
                self.base_url,
                urlencoding::encode(name)
            ),
            None => format!("{}/users", self.base_url),
        };
        let resp: UsersResponse = self.get_with_retry(&url).await?;
        Ok(resp.users)
    }

    /// Search the directory by username or email.
    pub async fn search_users(&self, query: &SearchQuery) -> Result<Vec<DirectoryUser>> {
        let url = match query {
            SearchQuery::Username(name) => format!(
                "{}/users/search?username={}",
                self.base_url,
                urlencoding::encode(name)
            ),
            SearchQuery::Email(email) => format!(
                "{}/users/search?email={}",
                self.base_url,
                urlencoding::encode(email)
            ),
        };
        let resp: UsersResponse = self.get_with_retry(&url).await?;
        Ok(resp.users)
    }

    /// Fetch the unread-message backlog for a user. Payload shapes are
    /// as loose as the live events; the session normalizes them.
    pub async fn fetch_unread(&self, user_id: &str) -> Result<Vec<RawPrivateMessage>> {
        let url = format!(
            "{}/messages/unread/{}",
            self.base_url,
            urlencoding::encode(user_id)
        );
        let resp: MessagesResponse = self.get_with_retry(&url).await?;
        Ok(resp.messages)
    }

    /// Delete the conversation with a peer, server-side. Mutating, so
    /// never retried.
    pub async fn delete_conversation(&self, peer_id: &str) -> Result<()> {
        let url = format!(
            "{}/messages/delete/{}",
            self.base_url,
            urlencoding::encode(peer_id)
        );
        let resp = self.client.delete(&url).send().await.map_err(|e| {
            ChitChatError::DirectoryFetchFailure(format!("Delete conversation: {}", e))
        })?;

        if !resp.status().is_success() {
            return Err(ChitChatError::DirectoryFetchFailure(format!(
                "Delete conversation failed: HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// GET with bounded retry and a short fixed delay between attempts.
    async fn get_with_retry<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut last_err = String::new();
        for attempt in 1..=self.retry_attempts {
            if attempt > 1 {
                tokio::time::sleep(Duration::from_millis(250)).await;
            }

            match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json::<T>().await.map_err(|e| {
                        ChitChatError::DirectoryFetchFailure(format!("Parse response: {}", e))
                    });
                }
                Ok(resp) => {
                    last_err = format!("HTTP {}", resp.status());
                    log::warn!(
                        "Directory fetch {} failed: {} (attempt {}/{})",
                        url,
                        last_err,
                        attempt,
                        self.retry_attempts
                    );
                }
                Err(e) => {
                    last_err = e.to_string();
                    log::warn!(
                        "Directory fetch {} failed: {} (attempt {}/{})",
                        url,
                        last_err,
                        attempt,
                        self.retry_attempts
                    );
                }
            }
        }

        Err(ChitChatError::DirectoryFetchFailure(last_err))
    }
}
