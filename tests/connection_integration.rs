//! Integration tests for the transport session lifecycle against a
//! real in-process WebSocket relay.

use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, accept_hdr_async};

use chitchat_client::{
    ChatSession, ChitChatError, ConnectionManager, CredentialsMode, EventHandler,
    IdentityRegistrar, IncomingMessageAdapter, SessionEvent, UserIdentity,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn identity() -> UserIdentity {
    UserIdentity {
        id: "u1".to_string(),
        username: "alice".to_string(),
    }
}

async fn wire_session(
    connection: &Arc<ConnectionManager>,
) -> (
    Arc<RwLock<ChatSession>>,
    mpsc::UnboundedReceiver<SessionEvent>,
) {
    let session = Arc::new(RwLock::new(ChatSession::new(identity(), connection.clone())));
    let (tx, rx) = mpsc::unbounded_channel();
    session.write().await.set_event_sink(tx);

    let registrar: Arc<dyn EventHandler> = Arc::new(IdentityRegistrar::new(
        connection.clone(),
        "u1".to_string(),
    ));
    connection.subscribe("connect", registrar).await;
    IncomingMessageAdapter::attach(session.clone(), connection).await;

    (session, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event sink closed")
}

#[tokio::test]
async fn register_fires_on_connect_and_inbound_traffic_dispatches() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Relay: record every frame; answer the register with one inbound
    // private message.
    let relay = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let mut frames: Vec<String> = Vec::new();
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(txt) => {
                    frames.push(txt.as_str().to_string());
                    if frames.len() == 1 {
                        let envelope = serde_json::json!({
                            "event": "privateMessage",
                            "data": {
                                "_id": "m1",
                                "sender": { "_id": "u2" },
                                "receiver": { "_id": "u1" },
                                "text": "hello from relay"
                            }
                        });
                        ws.send(Message::text(envelope.to_string())).await.unwrap();
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        frames
    });

    let connection = Arc::new(ConnectionManager::new(1, 0));
    let (session, mut rx) = wire_session(&connection).await;

    connection
        .open(&format!("ws://{}", addr), CredentialsMode::Omit)
        .await
        .unwrap();
    assert!(connection.is_connected());

    assert!(matches!(
        next_event(&mut rx).await,
        SessionEvent::Connected
    ));

    // The relay's message reaches the store through the adapter.
    loop {
        if let SessionEvent::MessageReceived(msg) = next_event(&mut rx).await {
            assert_eq!(msg.text, "hello from relay");
            assert_eq!(msg.sender_id, "u2");
            break;
        }
    }
    assert_eq!(session.read().await.unread_count("u2"), 1);

    // An outgoing send rides the same session.
    session.write().await.select_peer("u2");
    session.write().await.send_message("hi back").await.unwrap();

    // Give the writer task a beat to flush, then tear down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    connection.close().await;
    assert!(!connection.is_connected());

    let frames = timeout(Duration::from_secs(5), relay)
        .await
        .expect("relay did not shut down")
        .unwrap();
    assert_eq!(frames.len(), 2);

    let register: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(register["event"], "register");
    assert_eq!(register["data"], "u1");

    let outgoing: serde_json::Value = serde_json::from_str(&frames[1]).unwrap();
    assert_eq!(outgoing["event"], "privateMessage");
    assert_eq!(outgoing["data"]["senderId"], "u1");
    assert_eq!(outgoing["data"]["receiverId"], "u2");
    assert_eq!(outgoing["data"]["text"], "hi back");
}

#[tokio::test]
async fn include_mode_attaches_the_session_cookie() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (cookie_tx, cookie_rx) = tokio::sync::oneshot::channel::<Option<String>>();
    let relay = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut cookie_tx = Some(cookie_tx);
        let mut ws = accept_hdr_async(
            stream,
            |req: &tokio_tungstenite::tungstenite::handshake::server::Request,
             resp: tokio_tungstenite::tungstenite::handshake::server::Response| {
                let cookie = req
                    .headers()
                    .get("Cookie")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string());
                let _ = cookie_tx.take().unwrap().send(cookie);
                Ok(resp)
            },
        )
        .await
        .unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    let connection = Arc::new(ConnectionManager::new(1, 0));
    connection
        .open(
            &format!("ws://{}", addr),
            CredentialsMode::Include {
                cookie: "token=secret-session".to_string(),
            },
        )
        .await
        .unwrap();

    let seen = timeout(Duration::from_secs(5), cookie_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.as_deref(), Some("token=secret-session"));

    connection.close().await;
    let _ = timeout(Duration::from_secs(5), relay).await;
}

#[tokio::test]
async fn bounded_retry_then_connection_failure() {
    init_logging();
    // Grab a port nothing is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connection = ConnectionManager::new(2, 0);
    let result = connection
        .open(&format!("ws://{}", addr), CredentialsMode::Omit)
        .await;
    assert!(matches!(result, Err(ChitChatError::ConnectionFailure(_))));
    assert!(!connection.is_connected());
}

#[tokio::test]
async fn close_unsubscribes_handlers_before_the_next_session() {
    init_logging();
    // First session: normal wiring.
    let listener1 = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr1 = listener1.local_addr().unwrap();
    let relay1 = tokio::spawn(async move {
        let (stream, _) = listener1.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    let connection = Arc::new(ConnectionManager::new(1, 0));
    let (_session, mut rx) = wire_session(&connection).await;
    connection
        .open(&format!("ws://{}", addr1), CredentialsMode::Omit)
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut rx).await,
        SessionEvent::Connected
    ));

    connection.close().await;
    let _ = timeout(Duration::from_secs(5), relay1).await;

    // Second session opened without re-subscribing: the old handlers
    // must not fire against it.
    let listener2 = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr2 = listener2.local_addr().unwrap();
    let relay2 = tokio::spawn(async move {
        let (stream, _) = listener2.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let envelope = serde_json::json!({
            "event": "privateMessage",
            "data": { "_id": "m9", "senderId": "u2", "receiverId": "u1", "text": "stale?" }
        });
        ws.send(Message::text(envelope.to_string())).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    connection
        .open(&format!("ws://{}", addr2), CredentialsMode::Omit)
        .await
        .unwrap();

    // No Connected, no MessageReceived: every subscription was cleared.
    let quiet = timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(quiet.is_err(), "stale handler fired after close(): {:?}", quiet);

    connection.close().await;
    let _ = timeout(Duration::from_secs(5), relay2).await;
}
