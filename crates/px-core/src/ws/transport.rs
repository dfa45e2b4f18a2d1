//! The seam between the feed manager and the socket.
//!
//! The manager only needs three things from a connection: a way to send a
//! text frame, a way to close it, and the stream of [`WsEvent`]s. [`Connector`]
//! opens such a connection; [`WsConnector`] is the real tokio-tungstenite one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::client::{ReconnectPolicy, WsConnConfig, WsConnection, WsEvent};
use crate::config::FeedConfig;
use crate::error::PxError;

/// An open (or opening) connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue one outbound text frame.
    async fn send(&self, frame: String) -> Result<(), PxError>;
    /// Close the connection and wait for its task to exit.
    async fn close(&mut self);
}

/// A started transport plus its event stream.
pub struct TransportHandle {
    pub transport: Box<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<WsEvent>,
}

/// Opens transports. Must be called from inside a tokio runtime.
pub trait Connector: Send + Sync {
    fn open(&self, url: &str) -> Result<TransportHandle, PxError>;
}

#[async_trait]
impl Transport for WsConnection {
    async fn send(&self, frame: String) -> Result<(), PxError> {
        WsConnection::send(self, frame).await
    }

    async fn close(&mut self) {
        self.stop().await;
    }
}

/// Opens [`WsConnection`]s sharing one handshake, keep-alive and reconnect setup.
pub struct WsConnector {
    extra_headers: HashMap<String, String>,
    ping_interval: Option<Duration>,
    reconnect: Option<ReconnectPolicy>,
    next_id: AtomicUsize,
}

impl WsConnector {
    pub fn new(reconnect: Option<ReconnectPolicy>) -> Self {
        Self {
            extra_headers: HashMap::new(),
            ping_interval: None,
            reconnect,
            next_id: AtomicUsize::new(0),
        }
    }

    /// Build from the `feed` config section.
    pub fn from_config(cfg: &FeedConfig) -> Self {
        let mut connector = Self::new(cfg.reconnect_policy());
        connector.extra_headers = cfg.extra_headers.clone().unwrap_or_default();
        connector.ping_interval = cfg.ping_interval();
        connector
    }

    pub fn reconnect(&self) -> Option<ReconnectPolicy> {
        self.reconnect
    }
}

impl Connector for WsConnector {
    fn open(&self, url: &str) -> Result<TransportHandle, PxError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut conn = WsConnection::new(WsConnConfig {
            url: url.to_string(),
            extra_headers: self.extra_headers.clone(),
            ping_interval: self.ping_interval,
            reconnect: self.reconnect,
            id,
        });
        let events = conn.start();
        Ok(TransportHandle { transport: Box::new(conn), events })
    }
}
