//! # px-core
//!
//! Core crate for the USD price board, providing:
//!
//! - **Types** (`types`) — assets, currency pairs, feed messages, rate snapshots
//! - **Configuration** (`config`) — JSON config deserialization with defaults
//! - **Error types** (`error`) — domain-specific `PxError` via thiserror
//! - **WebSocket** (`ws`) — event-reporting WS client and the transport seam
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
