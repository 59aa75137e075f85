//! Relay channel over a websocket connection
//!
//! The relay is treated as an opaque, always-available collaborator: one
//! connect attempt per channel lifetime, one subscribed topic per connection,
//! and a fixed-interval upstream ping that keeps intermediaries from idling
//! the socket out. Server-side disconnects past the initial handshake are not
//! detected here; the owning coordinator only distinguishes "connect failed"
//! from "no message yet".

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Interval between upstream keepalive pings, in seconds
pub const HEARTBEAT_INTERVAL_SECS: u64 = 25;

/// Relay transport errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Relay connect failed: {0}")]
    Connect(String),
    #[error("Relay subscribe failed: {0}")]
    Subscribe(String),
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Factory for relay connections
///
/// Exactly one `connect` call per pairing attempt; the caller never retries
/// through the same channel, it recreates the whole attempt.
#[async_trait::async_trait]
pub trait RelayChannel: Send + Sync {
    async fn connect(&self) -> RelayResult<Box<dyn RelayConnection>>;
}

/// One live connection to the relay
#[async_trait::async_trait]
pub trait RelayConnection: Send {
    /// Subscribe to a single topic; messages arrive via `next_message`
    async fn subscribe(&mut self, topic: &str) -> RelayResult<()>;

    /// Wait for the next message on the subscribed topic
    ///
    /// Returns `None` once the connection is gone or disconnected.
    async fn next_message(&mut self) -> Option<String>;

    /// Tear the connection down; safe to call repeatedly and at any time
    async fn disconnect(&mut self);
}

/// Frame sent upstream to register interest in a topic
#[derive(Debug, Serialize)]
struct SubscribeFrame<'a> {
    subscribe: &'a str,
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Websocket-backed relay channel
pub struct WebSocketRelay {
    url: String,
}

impl WebSocketRelay {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait::async_trait]
impl RelayChannel for WebSocketRelay {
    async fn connect(&self) -> RelayResult<Box<dyn RelayConnection>> {
        info!("Connecting to relay: {}", self.url);

        let (ws_stream, _) = connect_async(&self.url)
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();
        let write = Arc::new(Mutex::new(write));

        let (message_tx, message_rx) = mpsc::channel::<String>(16);
        let reader = tokio::spawn(forward_messages(read, message_tx));
        let heartbeat = tokio::spawn(send_heartbeats(write.clone()));

        info!("Relay connected");
        Ok(Box::new(WebSocketConnection {
            write,
            message_rx,
            reader: Some(reader),
            heartbeat: Some(heartbeat),
        }))
    }
}

/// Forward inbound text frames to the subscriber
async fn forward_messages(mut read: WsSource, message_tx: mpsc::Sender<String>) {
    while let Some(result) = read.next().await {
        match result {
            Ok(Message::Text(body)) => {
                debug!("Relay message: {} bytes", body.len());
                if message_tx.send(body).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Relay closed the connection");
                break;
            }
            Ok(_) => {
                // Binary, ping and pong frames carry nothing for us
            }
            Err(e) => {
                warn!("Relay receive error: {}", e);
                break;
            }
        }
    }
}

/// One-directional keepalive: ping upstream on a fixed interval
async fn send_heartbeats(write: Arc<Mutex<WsSink>>) {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    interval.tick().await; // first tick fires immediately
    loop {
        interval.tick().await;
        let mut sink = write.lock().await;
        if sink.send(Message::Ping(Vec::new())).await.is_err() {
            debug!("Heartbeat send failed, stopping");
            break;
        }
    }
}

struct WebSocketConnection {
    write: Arc<Mutex<WsSink>>,
    message_rx: mpsc::Receiver<String>,
    reader: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

#[async_trait::async_trait]
impl RelayConnection for WebSocketConnection {
    async fn subscribe(&mut self, topic: &str) -> RelayResult<()> {
        let frame = serde_json::to_string(&SubscribeFrame { subscribe: topic })
            .map_err(|e| RelayError::Subscribe(e.to_string()))?;

        let mut sink = self.write.lock().await;
        sink.send(Message::Text(frame))
            .await
            .map_err(|e| RelayError::Subscribe(e.to_string()))?;

        info!("Subscribed to relay topic {}", topic);
        Ok(())
    }

    async fn next_message(&mut self) -> Option<String> {
        self.message_rx.recv().await
    }

    async fn disconnect(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        // Best-effort close frame; the relay drops the topic either way
        let mut sink = self.write.lock().await;
        let _ = sink.send(Message::Close(None)).await;
        debug!("Relay connection torn down");
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
