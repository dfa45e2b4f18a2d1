//! The rendered price board.
//!
//! One row per tracked asset plus the connect / disconnect toggle. A row
//! shows a loading placeholder until its first snapshot arrives, the price
//! picked by the selector afterwards, or a fixed error string after a failed
//! fetch until the next manual refresh.
//!
//! Fetch results are applied in arrival order. A slow, stale fetch that
//! resolves after a newer one overwrites it; there is no request tracking.

use std::fmt::Write as _;

use px_core::error::PxError;
use px_core::{Asset, CurrencyPair, Snapshot};
use px_feed::manager::FeedState;
use px_feed::selector::{PriceSource, format_price, select_price};
use px_feed::store::FeedStore;

pub const FETCH_ERROR_TEXT: &str = "Error fetching currencies";
pub const HEADER: &str = "Currency values relative to USD";
const PLACEHOLDER: &str = "…";

/// Per-asset REST state.
#[derive(Debug, Clone, Default)]
struct Slot {
    snapshot: Option<Snapshot>,
    loading: bool,
    failed: bool,
}

/// Rows in display order; `slots[i]` belongs to `assets[i]`.
pub struct Board {
    assets: Vec<Asset>,
    slots: Vec<Slot>,
    precision: u32,
}

impl Board {
    /// Every row starts loading: the initial fetch is issued right away.
    pub fn new(assets: Vec<Asset>, precision: u32) -> Self {
        let slots = vec![Slot { loading: true, ..Slot::default() }; assets.len()];
        Self { assets, slots, precision }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    fn slot(&self, asset: Asset) -> Option<&Slot> {
        let i = self.assets.iter().position(|a| *a == asset)?;
        self.slots.get(i)
    }

    fn slot_mut(&mut self, asset: Asset) -> Option<&mut Slot> {
        let i = self.assets.iter().position(|a| *a == asset)?;
        self.slots.get_mut(i)
    }

    /// A refresh is in flight for `asset`.
    pub fn mark_loading(&mut self, asset: Asset) {
        if let Some(slot) = self.slot_mut(asset) {
            slot.loading = true;
        }
    }

    /// Record a fetch result. Success replaces the snapshot wholesale.
    pub fn apply_fetch(&mut self, asset: Asset, result: Result<Snapshot, PxError>) {
        let Some(slot) = self.slot_mut(asset) else {
            return;
        };
        slot.loading = false;
        match result {
            Ok(snapshot) => {
                slot.snapshot = Some(snapshot);
                slot.failed = false;
            }
            Err(_) => {
                slot.snapshot = None;
                slot.failed = true;
            }
        }
    }

    /// One row of text for `asset`.
    pub fn row(&self, asset: Asset, store: &FeedStore) -> String {
        let Some(slot) = self.slot(asset) else {
            return String::new();
        };
        if slot.failed {
            return FETCH_ERROR_TEXT.to_string();
        }
        let snapshot = match (&slot.snapshot, slot.loading) {
            (Some(s), false) => s,
            _ => return format!("{asset:<5} {PLACEHOLDER}"),
        };
        match select_price(CurrencyPair::new(asset), Some(snapshot), store, self.precision) {
            Some(p) => {
                let marker = if p.source == PriceSource::Stream { " *" } else { "" };
                format!("{asset:<5} ${}{marker}", format_price(p.value, self.precision))
            }
            None => format!("{asset:<5} {PLACEHOLDER}"),
        }
    }

    /// Label of the toggle control. Any state but `Disconnected` offers to
    /// disconnect, since that is what `toggle` will do.
    pub fn toggle_label(state: FeedState) -> &'static str {
        match state {
            FeedState::Disconnected => "Connect to WebSocket",
            FeedState::Connecting | FeedState::Connected => "Disconnect from WebSocket",
        }
    }

    /// Full board text.
    pub fn render(&self, store: &FeedStore, state: FeedState) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{HEADER}");
        for asset in &self.assets {
            let _ = writeln!(out, "  {}", self.row(*asset, store));
        }
        let _ = write!(out, "[ {} ]", Self::toggle_label(state));
        out
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use px_feed::dispatcher::dispatch;

    use super::*;

    fn snap(asset: Asset, usd: &str) -> Snapshot {
        Snapshot { currency: asset, rates: HashMap::from([("USD".to_string(), usd.to_string())]) }
    }

    fn store() -> FeedStore {
        FeedStore::new(CurrencyPair::for_assets(&Asset::ALL))
    }

    #[test]
    fn rows_start_as_placeholders() {
        let board = Board::new(Asset::ALL.to_vec(), 3);
        assert_eq!(board.row(Asset::Btc, &store()), "BTC   …");
    }

    #[test]
    fn snapshot_then_stream() {
        let mut board = Board::new(Asset::ALL.to_vec(), 3);
        let mut store = store();
        board.apply_fetch(Asset::Btc, Ok(snap(Asset::Btc, "65000.1")));
        assert_eq!(board.row(Asset::Btc, &store), "BTC   $65000.100");

        store.set_connected(true);
        dispatch(&mut store, br#"{"type":"ticker","product_id":"BTC-USD","price":"65010.4567","sequence":1}"#);
        assert_eq!(board.row(Asset::Btc, &store), "BTC   $65010.457 *");
    }

    #[test]
    fn failure_sticks_until_a_successful_refresh() {
        let mut board = Board::new(Asset::ALL.to_vec(), 3);
        let store = store();
        board.apply_fetch(Asset::Eth, Err(PxError::Fetch("timeout".into())));
        assert_eq!(board.row(Asset::Eth, &store), FETCH_ERROR_TEXT);

        board.mark_loading(Asset::Eth);
        assert_eq!(board.row(Asset::Eth, &store), FETCH_ERROR_TEXT);

        board.apply_fetch(Asset::Eth, Ok(snap(Asset::Eth, "3000")));
        assert_eq!(board.row(Asset::Eth, &store), "ETH   $3000.000");
    }

    #[test]
    fn refresh_shows_placeholder_while_loading() {
        let mut board = Board::new(vec![Asset::Sol], 3);
        let store = store();
        board.apply_fetch(Asset::Sol, Ok(snap(Asset::Sol, "150")));
        board.mark_loading(Asset::Sol);
        assert_eq!(board.row(Asset::Sol, &store), "SOL   …");
    }

    #[test]
    fn render_includes_toggle_label() {
        let board = Board::new(vec![Asset::Xrp], 3);
        let store = store();
        assert!(board.render(&store, FeedState::Disconnected).ends_with("[ Connect to WebSocket ]"));
        assert!(board.render(&store, FeedState::Connected).ends_with("[ Disconnect from WebSocket ]"));
        assert!(board.render(&store, FeedState::Connected).starts_with(HEADER));
    }

    #[test]
    fn reconnect_gap_still_offers_disconnect() {
        let board = Board::new(vec![Asset::Btc], 3);
        let store = store();
        assert!(!store.is_connected());
        assert!(board.render(&store, FeedState::Connecting).ends_with("[ Disconnect from WebSocket ]"));
    }

    #[test]
    fn rows_follow_configured_order() {
        let mut board = Board::new(vec![Asset::Sol, Asset::Btc], 3);
        board.apply_fetch(Asset::Btc, Ok(snap(Asset::Btc, "1")));
        board.apply_fetch(Asset::Eth, Ok(snap(Asset::Eth, "2")));
        let text = board.render(&store(), FeedState::Disconnected);
        let rows: Vec<&str> = text.lines().skip(1).take(2).collect();
        assert_eq!(rows, ["  SOL   …", "  BTC   $1.000"]);
    }
}
