//! Single WebSocket connection reporting lifecycle events over a channel.
//!
//! Each `WsConnection` runs as a tokio task that:
//! 1. Connects to the feed endpoint (TLS).
//! 2. Reports [`WsEvent::Opened`] once the handshake completes. Subscribing
//!    is the owner's job, in response to that event.
//! 3. Forwards every text frame as [`WsEvent::Text`], in arrival order.
//! 4. Sends queued outbound frames and, if configured, protocol pings.
//! 5. On disconnect reports [`WsEvent::Closed`] and, only when a
//!    [`ReconnectPolicy`] is configured, reconnects with exponential backoff.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use crate::error::PxError;

/// Lifecycle and data events emitted by a connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    /// Handshake completed; the socket accepts outbound frames.
    Opened,
    /// One inbound text frame.
    Text(String),
    /// Non-fatal transport error. A `Closed` follows if the socket died.
    Error(String),
    /// The socket is gone. With `reconnecting == false` the task has exited.
    Closed { reason: String, reconnecting: bool },
}

/// Opt-in reconnect schedule: start at `initial_backoff`, double per
/// failure, cap at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { initial_backoff: Duration::from_millis(100), max_backoff: Duration::from_secs(30) }
    }
}

impl ReconnectPolicy {
    /// Backoff to use after one more failure.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_backoff)
    }
}

/// Configuration for a single WebSocket connection.
#[derive(Debug, Clone)]
pub struct WsConnConfig {
    /// Full WebSocket URL (e.g. `wss://ws-feed.exchange.coinbase.com`).
    pub url: String,
    /// Extra HTTP headers for the handshake.
    pub extra_headers: HashMap<String, String>,
    /// Keep-alive period for protocol-level pings; `None` disables them.
    pub ping_interval: Option<Duration>,
    /// `None` keeps the connection manual-only: one attempt, no retries.
    pub reconnect: Option<ReconnectPolicy>,
    /// Connection identifier, used as the log label.
    pub id: usize,
}

/// A single WebSocket connection managed by a background tokio task.
pub struct WsConnection {
    /// Connection configuration.
    pub config: WsConnConfig,
    /// Channel to send outbound messages.
    outbound_tx: Option<mpsc::Sender<String>>,
    /// Shutdown signal sender.
    shutdown_tx: Option<watch::Sender<bool>>,
    /// Task join handle.
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsConnection {
    /// Create a new (not yet started) connection.
    pub fn new(config: WsConnConfig) -> Self {
        Self { config, outbound_tx: None, shutdown_tx: None, task: None }
    }

    /// Start the connection task and return its event stream.
    pub fn start(&mut self) -> mpsc::UnboundedReceiver<WsEvent> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(64);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            connection_loop(config, events_tx, outbound_rx, shutdown_rx).await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.outbound_tx = Some(outbound_tx);
        self.task = Some(task);
        events_rx
    }

    /// Queue a text frame for sending.
    pub async fn send(&self, msg: String) -> Result<(), PxError> {
        let tx = self
            .outbound_tx
            .as_ref()
            .ok_or_else(|| PxError::InvalidState(format!("[ws-{}] not started", self.config.id)))?;
        tx.send(msg)
            .await
            .map_err(|_| PxError::WebSocket(format!("[ws-{}] connection task has exited", self.config.id)))
    }

    /// Whether the background task is still alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the connection and wait for the task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        self.outbound_tx = None;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Main connection loop — connects, reads, writes, pings, and optionally
/// reconnects.
async fn connection_loop(
    config: WsConnConfig,
    events: mpsc::UnboundedSender<WsEvent>,
    mut outbound_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let conn_id = config.id;
    let mut backoff = config.reconnect.map(|p| p.initial_backoff).unwrap_or_default();

    loop {
        if *shutdown_rx.borrow() {
            info!("[ws-{conn_id}] shutdown requested");
            return;
        }

        info!("[ws-{conn_id}] connecting to {}", config.url);

        let attempt = tokio::select! {
            r = connect_ws(&config) => r,
            _ = shutdown_rx.changed() => {
                info!("[ws-{conn_id}] shutdown during connect");
                return;
            }
        };

        let ws_stream = match attempt {
            Ok(s) => {
                if let Some(policy) = config.reconnect {
                    backoff = policy.initial_backoff;
                }
                info!("[ws-{conn_id}] connected");
                s
            }
            Err(e) => {
                error!("[ws-{conn_id}] connection failed: {e}");
                let _ = events.send(WsEvent::Error(format!("connection failed: {e}")));
                match config.reconnect {
                    Some(policy) => {
                        warn!("[ws-{conn_id}] retrying in {backoff:?}");
                        if sleep_or_shutdown(backoff, &mut shutdown_rx).await {
                            return;
                        }
                        backoff = policy.next_backoff(backoff);
                        continue;
                    }
                    None => {
                        let _ = events.send(WsEvent::Closed { reason: e.to_string(), reconnecting: false });
                        return;
                    }
                }
            }
        };

        let _ = events.send(WsEvent::Opened);

        let (mut ws_write, mut ws_read) = ws_stream.split();

        let ping_interval = config.ping_interval.map(tokio::time::interval);

        tokio::pin! {
            let ping_tick = async {
                if let Some(mut interval) = ping_interval {
                    // The first tick completes immediately.
                    interval.tick().await;
                    loop {
                        interval.tick().await;
                    }
                } else {
                    std::future::pending::<()>().await
                }
            };
        }

        let reason = loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("[ws-{conn_id}] shutdown signal received");
                    let _ = ws_write.close().await;
                    return;
                }

                msg = ws_read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let _ = events.send(WsEvent::Text(text.as_str().to_owned()));
                        }
                        Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                            Ok(text) => {
                                let _ = events.send(WsEvent::Text(text));
                            }
                            Err(_) => debug!("[ws-{conn_id}] dropping non-UTF-8 binary frame ({} bytes)", data.len()),
                        },
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            warn!("[ws-{conn_id}] received close frame");
                            break frame.map(|f| f.reason.as_str().to_owned()).unwrap_or_else(|| "close frame".into());
                        }
                        Some(Err(e)) => {
                            error!("[ws-{conn_id}] read error: {e}");
                            let _ = events.send(WsEvent::Error(format!("read error: {e}")));
                            break e.to_string();
                        }
                        None => {
                            warn!("[ws-{conn_id}] stream ended");
                            break "stream ended".into();
                        }
                        _ => {} // Pong, Frame
                    }
                }

                Some(msg) = outbound_rx.recv() => {
                    debug!("[ws-{conn_id}] sending: {msg}");
                    if let Err(e) = ws_write.send(Message::Text(msg.into())).await {
                        error!("[ws-{conn_id}] send error: {e}");
                        let _ = events.send(WsEvent::Error(format!("send error: {e}")));
                        break e.to_string();
                    }
                }

                _ = &mut ping_tick => {
                    trace!("[ws-{conn_id}] ping");
                    if let Err(e) = ws_write.send(Message::Ping(Vec::new().into())).await {
                        error!("[ws-{conn_id}] keep-alive failed: {e}");
                        break e.to_string();
                    }
                }
            }
        };

        match config.reconnect {
            Some(policy) => {
                warn!("[ws-{conn_id}] disconnected ({reason}), reconnecting in {backoff:?}");
                let _ = events.send(WsEvent::Closed { reason, reconnecting: true });
                if sleep_or_shutdown(backoff, &mut shutdown_rx).await {
                    return;
                }
                backoff = policy.next_backoff(backoff);
            }
            None => {
                warn!("[ws-{conn_id}] disconnected ({reason})");
                let _ = events.send(WsEvent::Closed { reason, reconnecting: false });
                return;
            }
        }
    }
}

/// Sleep for `delay`; returns `true` if shutdown was requested meanwhile.
async fn sleep_or_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown_rx.changed() => true,
    }
}

/// Establish a (possibly TLS) WebSocket connection.
async fn connect_ws(
    config: &WsConnConfig,
) -> anyhow::Result<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};

    let mut request = config.url.as_str().into_client_request()?;
    for (key, value) in &config.extra_headers {
        request
            .headers_mut()
            .insert(HeaderName::from_bytes(key.as_bytes())?, HeaderValue::from_str(value)?);
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}
