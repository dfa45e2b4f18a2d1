//! Inbound frame dispatcher.
//!
//! Parses raw feed frames, routes them by the `type` discriminator:
//!
//! - `ticker` → the pair's ticker slot in [`FeedStore`]
//! - `heartbeat` → the pair's heartbeat slot
//! - `subscriptions` / `error` → logged only
//!
//! Anything else (no `type`, an unknown `type`, bad JSON, an untracked
//! product) is dropped and leaves the store untouched. New frame kinds the
//! exchange adds later therefore pass through harmlessly.

use px_core::{CurrencyPair, FeedMessage};
use tracing::{debug, info, trace, warn};

use crate::store::FeedStore;

/// Why a frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Not JSON, not an object, or a known type with a bad body.
    Malformed(String),
    /// No string `type` field.
    MissingType,
    /// A `type` this crate does not handle.
    UnknownType(String),
    /// Well-formed, but for a product not in the store.
    UntrackedPair(String),
}

/// Outcome of dispatching one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    Ticker(CurrencyPair),
    Heartbeat(CurrencyPair),
    /// `subscriptions` ack or server `error` frame.
    Control,
    Dropped(DropReason),
}

/// Decode one raw frame into a [`FeedMessage`].
pub fn parse_frame(raw: &[u8]) -> Result<FeedMessage, DropReason> {
    let v: serde_json::Value = serde_json::from_slice(raw).map_err(|e| DropReason::Malformed(e.to_string()))?;

    let kind = v.get("type").and_then(|t| t.as_str()).ok_or(DropReason::MissingType)?;
    if !FeedMessage::KNOWN_TYPES.contains(&kind) {
        return Err(DropReason::UnknownType(kind.to_string()));
    }

    serde_json::from_value(v).map_err(|e| DropReason::Malformed(e.to_string()))
}

/// Parse `raw` and apply it to `store`.
pub fn dispatch(store: &mut FeedStore, raw: &[u8]) -> Dispatched {
    let msg = match parse_frame(raw) {
        Ok(m) => m,
        Err(reason) => {
            debug!("[dispatch] dropped frame: {reason:?}");
            return Dispatched::Dropped(reason);
        }
    };
    apply(store, msg)
}

/// Apply an already decoded message.
pub fn apply(store: &mut FeedStore, msg: FeedMessage) -> Dispatched {
    match msg {
        FeedMessage::Ticker(ticker) => {
            let Some(pair) = tracked_pair(store, &ticker.product_id) else {
                return Dispatched::Dropped(DropReason::UntrackedPair(ticker.product_id));
            };
            trace!("[dispatch] {pair} ticker seq={} price={}", ticker.sequence, ticker.price);
            store.put_ticker(pair, ticker);
            Dispatched::Ticker(pair)
        }
        FeedMessage::Heartbeat(hb) => {
            let Some(pair) = tracked_pair(store, &hb.product_id) else {
                return Dispatched::Dropped(DropReason::UntrackedPair(hb.product_id));
            };
            trace!("[dispatch] {pair} heartbeat seq={}", hb.sequence);
            store.put_heartbeat(pair, hb);
            Dispatched::Heartbeat(pair)
        }
        FeedMessage::Subscriptions(ack) => {
            let names: Vec<&str> = ack.channels.iter().map(|c| c.name()).collect();
            info!("[dispatch] subscriptions active: {names:?}");
            Dispatched::Control
        }
        FeedMessage::Error(err) => {
            warn!("[dispatch] feed error: {} ({})", err.message, err.reason.as_deref().unwrap_or("no reason"));
            Dispatched::Control
        }
    }
}

fn tracked_pair(store: &FeedStore, product_id: &str) -> Option<CurrencyPair> {
    match product_id.parse::<CurrencyPair>() {
        Ok(pair) if store.contains(pair) => Some(pair),
        _ => {
            debug!("[dispatch] ignoring untracked product {product_id}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use px_core::Asset;
    use rust_decimal::Decimal;

    use super::*;

    fn full_store() -> FeedStore {
        FeedStore::new(CurrencyPair::for_assets(&Asset::ALL))
    }

    fn snapshot_of(store: &FeedStore) -> Vec<Option<crate::store::PairEntry>> {
        Asset::ALL.iter().map(|a| store.entry((*a).into()).cloned()).collect()
    }

    #[test]
    fn ticker_lands_in_its_pair() {
        let mut store = full_store();
        let raw = br#"{"type":"ticker","product_id":"BTC-USD","price":"65010.4567","sequence":5,
            "best_bid":"65010.1","best_ask":"65010.9","time":"2024-01-01T00:00:00Z"}"#;
        assert_eq!(dispatch(&mut store, raw), Dispatched::Ticker(CurrencyPair::new(Asset::Btc)));
        let t = store.entry(Asset::Btc.into()).unwrap().ticker.as_ref().unwrap();
        assert_eq!(t.price, Decimal::from_str("65010.4567").unwrap());
        assert!(store.entry(Asset::Eth.into()).unwrap().ticker.is_none());
    }

    #[test]
    fn heartbeat_fills_heartbeat_slot_only() {
        let mut store = full_store();
        let raw = br#"{"type":"heartbeat","product_id":"SOL-USD","sequence":90,"last_trade_id":20,
            "time":"2014-11-07T08:19:28.464459Z"}"#;
        assert_eq!(dispatch(&mut store, raw), Dispatched::Heartbeat(CurrencyPair::new(Asset::Sol)));
        let entry = store.entry(Asset::Sol.into()).unwrap();
        assert_eq!(entry.heartbeat.as_ref().unwrap().sequence, 90);
        assert!(entry.ticker.is_none());
    }

    #[test]
    fn malformed_and_unknown_frames_leave_store_unchanged() {
        let mut store = full_store();
        let before = snapshot_of(&store);

        let cases: [(&[u8], fn(&Dispatched) -> bool); 5] = [
            (b"not json", |d| matches!(d, Dispatched::Dropped(DropReason::Malformed(_)))),
            (br#"{"product_id":"BTC-USD","price":"1"}"#, |d| matches!(d, Dispatched::Dropped(DropReason::MissingType))),
            (br#"{"type":"level2","product_id":"BTC-USD"}"#, |d| {
                matches!(d, Dispatched::Dropped(DropReason::UnknownType(t)) if t == "level2")
            }),
            (br#"{"type":"ticker","product_id":"BTC-USD"}"#, |d| matches!(d, Dispatched::Dropped(DropReason::Malformed(_)))),
            (br#"{"type":"ticker","product_id":"ADA-USD","price":"0.4","sequence":1}"#, |d| {
                matches!(d, Dispatched::Dropped(DropReason::UntrackedPair(p)) if p == "ADA-USD")
            }),
        ];

        for (raw, check) in cases {
            let out = dispatch(&mut store, raw);
            assert!(check(&out), "unexpected outcome {out:?} for {}", String::from_utf8_lossy(raw));
        }
        assert_eq!(snapshot_of(&store), before);
    }

    #[test]
    fn pair_outside_configured_subset_is_ignored() {
        let mut store = FeedStore::new([CurrencyPair::new(Asset::Btc)]);
        let raw = br#"{"type":"ticker","product_id":"ETH-USD","price":"3000","sequence":1}"#;
        assert!(matches!(dispatch(&mut store, raw), Dispatched::Dropped(DropReason::UntrackedPair(_))));
    }

    #[test]
    fn control_frames_do_not_touch_store() {
        let mut store = full_store();
        let before = snapshot_of(&store);
        let ack = br#"{"type":"subscriptions","channels":[{"name":"ticker","product_ids":["BTC-USD"]}]}"#;
        let err = br#"{"type":"error","message":"Failed to subscribe","reason":"BAD-USD is not a valid product"}"#;
        assert_eq!(dispatch(&mut store, ack), Dispatched::Control);
        assert_eq!(dispatch(&mut store, err), Dispatched::Control);
        assert_eq!(snapshot_of(&store), before);
    }
}
