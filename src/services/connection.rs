//! Connection Manager — owns the transport session lifecycle: connect,
//! disconnect, event subscription, and best-effort emit. One session
//! per client instance; reconnects go through `close()` + `open()`.

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::ClientRequestBuilder;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{ChitChatError, Result};

/// Synthetic event dispatched after a session is established. Fired
/// once per session, so handlers that must re-run on reconnect (the
/// identity registrar) subscribe to it instead of hooking `open()`.
pub const EVENT_CONNECT: &str = "connect";
/// Synthetic event dispatched when the remote end drops the session.
pub const EVENT_DISCONNECT: &str = "disconnect";

/// Inbound event handler. Handlers for one session are invoked in
/// arrival order from a single dispatch task; implementations that
/// mutate shared state take their own lock (serialized mutation path).
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &str, payload: Value);
}

/// Whether to attach the session credential to the upgrade request.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialsMode {
    /// Send the session cookie obtained at login.
    Include { cookie: String },
    Omit,
}

/// Wire framing: every frame is `{ "event": ..., "data": ... }`.
#[derive(Debug, Serialize, Deserialize)]
struct EventEnvelope {
    event: String,
    #[serde(default)]
    data: Value,
}

type HandlerMap = Arc<RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>>;

struct SessionHandle {
    outgoing_tx: mpsc::UnboundedSender<Message>,
    shutdown_tx: watch::Sender<bool>,
}

/// Explicitly owned transport session manager — injected into
/// consumers, never referenced as ambient state.
pub struct ConnectionManager {
    handlers: HandlerMap,
    session: RwLock<Option<SessionHandle>>,
    connected: Arc<AtomicBool>,
    max_attempts: u32,
    backoff_secs: u64,
}

impl ConnectionManager {
    pub fn new(max_attempts: u32, backoff_secs: u64) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            session: RwLock::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            max_attempts: max_attempts.max(1),
            backoff_secs,
        }
    }

    /// Register a handler for every inbound event of that name.
    pub async fn subscribe(&self, event: &str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .await
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    /// Establish the persistent bidirectional channel, with a bounded
    /// retry policy. On success spawns the writer and reader tasks and
    /// dispatches the synthetic `connect` event.
    pub async fn open(&self, endpoint: &str, credentials: CredentialsMode) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            log::debug!("Transport session already open, ignoring open()");
            return Ok(());
        }

        let url = url::Url::parse(endpoint)
            .map_err(|e| ChitChatError::ConnectionFailure(format!("Invalid endpoint: {}", e)))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ChitChatError::ConnectionFailure(format!(
                "Unsupported transport scheme: {}",
                url.scheme()
            )));
        }

        let stream = self.connect_with_retry(endpoint, &credentials).await?;
        let (mut ws_tx, mut ws_rx) = stream.split();

        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Writer task: drains the outgoing queue onto the socket.
        let mut writer_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.changed() => {
                        let _ = ws_tx.close().await;
                        break;
                    }
                    frame = outgoing_rx.recv() => match frame {
                        Some(msg) => {
                            if let Err(e) = ws_tx.send(msg).await {
                                log::warn!("Transport write failed: {}", e);
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        });

        // Reader task: decodes envelopes and dispatches to subscribed
        // handlers sequentially, in arrival order.
        let handlers = self.handlers.clone();
        let connected = self.connected.clone();
        let mut reader_shutdown = shutdown_rx;
        tokio::spawn(async move {
            let remote_drop = loop {
                tokio::select! {
                    _ = reader_shutdown.changed() => break false,
                    frame = ws_rx.next() => match frame {
                        Some(Ok(Message::Text(txt))) => {
                            match serde_json::from_str::<EventEnvelope>(txt.as_str()) {
                                Ok(envelope) => {
                                    dispatch(&handlers, &envelope.event, envelope.data).await;
                                }
                                Err(e) => {
                                    log::warn!("Undecodable transport frame: {}", e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break true,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            log::warn!("Transport read failed: {}", e);
                            break true;
                        }
                    }
                }
            };

            if remote_drop {
                connected.store(false, Ordering::SeqCst);
                log::info!("Transport session dropped by remote");
                dispatch(&handlers, EVENT_DISCONNECT, Value::Null).await;
            }
        });

        *self.session.write().await = Some(SessionHandle {
            outgoing_tx,
            shutdown_tx,
        });
        self.connected.store(true, Ordering::SeqCst);
        log::info!("Transport session open to {}", endpoint);

        dispatch(&self.handlers, EVENT_CONNECT, Value::Null).await;
        Ok(())
    }

    /// Emit an event. Fails with `ConnectionFailure` when no session is
    /// open so callers can surface a disconnected indicator instead of
    /// silently losing the send.
    pub async fn send(&self, event: &str, payload: Value) -> Result<()> {
        let session = self.session.read().await;
        let handle = session
            .as_ref()
            .filter(|_| self.connected.load(Ordering::SeqCst))
            .ok_or_else(|| {
                ChitChatError::ConnectionFailure("Transport session is not open".to_string())
            })?;

        let frame = serde_json::to_string(&EventEnvelope {
            event: event.to_string(),
            data: payload,
        })
        .map_err(|e| ChitChatError::ConnectionFailure(format!("Encode frame: {}", e)))?;

        handle.outgoing_tx.send(Message::text(frame)).map_err(|_| {
            ChitChatError::ConnectionFailure("Transport session is closing".to_string())
        })
    }

    /// Tear down the transport and unsubscribe every handler, so a
    /// reconnect cannot double-register handlers and a stale handler
    /// cannot double-apply updates against the next session.
    pub async fn close(&self) {
        if let Some(handle) = self.session.write().await.take() {
            let _ = handle.shutdown_tx.send(true);
            log::info!("Transport session closed");
        }
        self.connected.store(false, Ordering::SeqCst);
        self.handlers.write().await.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect_with_retry(
        &self,
        endpoint: &str,
        credentials: &CredentialsMode,
    ) -> Result<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>>
    {
        let mut last_err = String::new();
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = self.backoff_secs * (1 << (attempt - 2));
                log::info!(
                    "Retrying transport connect in {}s (attempt {}/{})",
                    delay,
                    attempt,
                    self.max_attempts
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }

            let result = match credentials {
                CredentialsMode::Include { cookie } => {
                    let uri: Uri = endpoint.parse().map_err(|e| {
                        ChitChatError::ConnectionFailure(format!("Invalid endpoint: {}", e))
                    })?;
                    let request = ClientRequestBuilder::new(uri)
                        .with_header("Cookie", cookie.clone());
                    connect_async(request).await
                }
                CredentialsMode::Omit => connect_async(endpoint).await,
            };

            match result {
                Ok((stream, _response)) => return Ok(stream),
                Err(e) => {
                    log::warn!(
                        "Transport connect failed (attempt {}/{}): {}",
                        attempt,
                        self.max_attempts,
                        e
                    );
                    last_err = e.to_string();
                }
            }
        }

        Err(ChitChatError::ConnectionFailure(format!(
            "Connect failed after {} attempts: {}",
            self.max_attempts, last_err
        )))
    }
}

async fn dispatch(handlers: &HandlerMap, event: &str, data: Value) {
    let subscribed = handlers.read().await.get(event).cloned();
    if let Some(subscribed) = subscribed {
        for handler in subscribed {
            handler.handle(event, data.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let frame = serde_json::to_string(&EventEnvelope {
            event: "privateMessage".to_string(),
            data: serde_json::json!({ "text": "hi" }),
        })
        .unwrap();
        let parsed: EventEnvelope = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed.event, "privateMessage");
        assert_eq!(parsed.data["text"], "hi");
    }

    #[test]
    fn test_envelope_data_defaults_to_null() {
        let parsed: EventEnvelope = serde_json::from_str(r#"{"event":"connect"}"#).unwrap();
        assert!(parsed.data.is_null());
    }

    #[tokio::test]
    async fn test_send_without_session_is_a_connection_failure() {
        let conn = ConnectionManager::new(1, 0);
        let result = conn.send("privateMessage", Value::Null).await;
        assert!(matches!(result, Err(ChitChatError::ConnectionFailure(_))));
    }

    #[tokio::test]
    async fn test_open_rejects_non_websocket_scheme() {
        let conn = ConnectionManager::new(1, 0);
        let result = conn.open("http://localhost:9", CredentialsMode::Omit).await;
        assert!(matches!(result, Err(ChitChatError::ConnectionFailure(_))));
    }
}
