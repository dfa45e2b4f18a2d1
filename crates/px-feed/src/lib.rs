//! # px-feed
//!
//! Price sources and their reconciliation.
//!
//! ## Architecture
//!
//! ```text
//! SnapshotFetcher ── REST ──► Snapshot ─────────────┐
//!                                                   ▼
//! FeedManager ── WsEvent::Text ──► dispatcher ──► FeedStore ──► selector ──► price
//!      └─ activate / deactivate flips FeedStore.connected
//! ```
//!
//! - [`snapshot`] — one-shot `exchange-rates` fetcher
//! - [`store`] — per-pair latest ticker / heartbeat plus the connectivity flag
//! - [`dispatcher`] — frame classification and store updates
//! - [`manager`] — connection state machine
//! - [`selector`] — streamed-vs-snapshot price choice and rounding

pub mod dispatcher;
pub mod manager;
pub mod selector;
pub mod snapshot;
pub mod store;

use async_trait::async_trait;
use px_core::{Asset, Snapshot, error::PxError};

/// A source of one-shot rate snapshots.
///
/// Implementations perform no retries; retrying is the caller's decision.
#[async_trait]
pub trait RatesSource: Send + Sync {
    /// Fetch the current rates for `asset`. The result always has a USD rate.
    async fn fetch(&self, asset: Asset) -> Result<Snapshot, PxError>;
}
