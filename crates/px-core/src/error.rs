//! Typed error definitions for the price board.
//!
//! [`PxError`] covers every failure class the feed and fetcher can observe.
//! None of them is fatal: the runner logs them, or shows them per pair, and
//! keeps going. All variants implement `std::error::Error` via `thiserror`,
//! so they compose with `anyhow::Result` at the application edge.

use thiserror::Error;

/// Domain-specific errors for the price board.
#[derive(Debug, Error)]
pub enum PxError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// WebSocket open failure or runtime transport error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Malformed inbound frame.
    #[error("parse error: {0}")]
    Parse(String),

    /// Snapshot request failed (network, HTTP status, or body).
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Operation not valid in the current connection state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}
