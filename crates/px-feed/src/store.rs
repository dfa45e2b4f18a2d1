//! Reconciliation store.
//!
//! Holds the connectivity flag and, for every tracked pair, the latest
//! streamed ticker and heartbeat. Entries exist from construction and are
//! never removed; updates overwrite in place (last received wins, no
//! sequence check).
//!
//! The store is shared as [`SharedStore`]. Each inbound frame or flag flip is
//! applied under one write lock, so readers never see a half-applied update.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use px_core::{CurrencyPair, HeartbeatMessage, TickerMessage};

/// Latest streamed state for one pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairEntry {
    pub ticker: Option<TickerMessage>,
    pub heartbeat: Option<HeartbeatMessage>,
}

/// Per-pair feed state plus the connectivity flag.
#[derive(Debug, Clone, Default)]
pub struct FeedStore {
    connected: bool,
    pairs: AHashMap<CurrencyPair, PairEntry>,
}

/// Handle passed to the manager and the board.
pub type SharedStore = Arc<RwLock<FeedStore>>;

impl FeedStore {
    /// Empty entries for every pair; disconnected.
    pub fn new(pairs: impl IntoIterator<Item = CurrencyPair>) -> Self {
        Self { connected: false, pairs: pairs.into_iter().map(|p| (p, PairEntry::default())).collect() }
    }

    /// Wrap in a [`SharedStore`].
    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn entry(&self, pair: CurrencyPair) -> Option<&PairEntry> {
        self.pairs.get(&pair)
    }

    pub fn contains(&self, pair: CurrencyPair) -> bool {
        self.pairs.contains_key(&pair)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Overwrite the pair's ticker. Returns `false` (and changes nothing)
    /// for an untracked pair.
    pub fn put_ticker(&mut self, pair: CurrencyPair, ticker: TickerMessage) -> bool {
        match self.pairs.get_mut(&pair) {
            Some(entry) => {
                entry.ticker = Some(ticker);
                true
            }
            None => false,
        }
    }

    /// Overwrite the pair's heartbeat. Same contract as [`put_ticker`](Self::put_ticker).
    pub fn put_heartbeat(&mut self, pair: CurrencyPair, heartbeat: HeartbeatMessage) -> bool {
        match self.pairs.get_mut(&pair) {
            Some(entry) => {
                entry.heartbeat = Some(heartbeat);
                true
            }
            None => false,
        }
    }
}
