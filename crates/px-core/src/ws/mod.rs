//! WebSocket client and the transport seam used by the feed manager.

pub mod client;
pub mod transport;

pub use client::{ReconnectPolicy, WsConnConfig, WsConnection, WsEvent};
pub use transport::{Connector, Transport, TransportHandle, WsConnector};
