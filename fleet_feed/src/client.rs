//! Reconnecting websocket subscriber.
//!
//! The client owns one background task that dials the endpoint, forwards
//! every text frame over an unbounded channel, and redials after a fixed
//! delay whenever the connection drops. Frame contents are opaque here;
//! parsing and sanitizing belong to the engine.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// What the pump task reports back to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Connected,
    /// One raw text frame, exactly as received.
    Frame(String),
    Disconnected,
}

/// Handle to the background pump task.
pub struct FeedHandle {
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop pumping. Idempotent; the endpoint is not notified.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

/// Websocket feed subscriber.
pub struct FeedClient {
    url: String,
}

impl FeedClient {
    /// `endpoint` may be a bare `host:port`; a `ws://` scheme is assumed
    /// unless one is already present.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let url = if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            endpoint
        } else {
            format!("ws://{}", endpoint)
        };
        Self { url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Spawn the pump task. It runs until the handle is shut down or the
    /// receiver is dropped.
    pub fn start(self) -> (FeedHandle, mpsc::UnboundedReceiver<FeedEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_pump(self.url, event_tx));
        (FeedHandle { task }, event_rx)
    }
}

async fn run_pump(url: String, events: mpsc::UnboundedSender<FeedEvent>) {
    loop {
        match connect_async(&url).await {
            Ok((ws_stream, _)) => {
                info!(target: "fleetglass::feed", url = %url, "feed.connected");
                if events.send(FeedEvent::Connected).is_err() {
                    return;
                }
                pump_frames(ws_stream, &events).await;
                if events.send(FeedEvent::Disconnected).is_err() {
                    return;
                }
                info!(target: "fleetglass::feed", url = %url, "feed.disconnected");
            }
            Err(err) => {
                warn!(target: "fleetglass::feed", url = %url, error = %err, "feed.connect_failed");
            }
        }

        if events.is_closed() {
            return;
        }
        sleep(RECONNECT_DELAY).await;
    }
}

/// Forward text frames until the stream ends. Binary, ping, and pong
/// frames are ignored.
async fn pump_frames(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    events: &mpsc::UnboundedSender<FeedEvent>,
) {
    let (_write, mut read) = ws_stream.split();

    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(frame)) => {
                if events.send(FeedEvent::Frame(frame)).is_err() {
                    return;
                }
            }
            Ok(Message::Close(_)) => {
                debug!(target: "fleetglass::feed", "feed.close_frame");
                return;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(target: "fleetglass::feed", error = %err, "feed.receive_error");
                return;
            }
        }
    }
}
