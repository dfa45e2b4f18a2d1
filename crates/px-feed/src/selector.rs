//! Display price selection.
//!
//! While the feed is live and a ticker has arrived for the pair, the
//! streamed price wins; otherwise the REST snapshot's USD rate is used.
//! Rounding to display precision happens here, with the precision passed in
//! by the caller.

use px_core::{CurrencyPair, Snapshot};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::store::FeedStore;

/// Where a selected price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Stream,
    Snapshot,
}

/// A rounded display price and its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedPrice {
    pub value: Decimal,
    pub source: PriceSource,
}

/// Pick the price to show for `pair`.
///
/// Returns `None` when neither a live tick (while connected) nor a snapshot
/// for the pair's base asset is available; the caller shows a placeholder.
pub fn select_price(
    pair: CurrencyPair,
    snapshot: Option<&Snapshot>,
    store: &FeedStore,
    precision: u32,
) -> Option<SelectedPrice> {
    let streamed = store
        .is_connected()
        .then(|| store.entry(pair))
        .flatten()
        .and_then(|e| e.ticker.as_ref())
        .map(|t| SelectedPrice { value: t.price, source: PriceSource::Stream });

    let selected = streamed.or_else(|| {
        snapshot
            .filter(|s| s.currency == pair.base())
            .and_then(Snapshot::usd_rate)
            .map(|value| SelectedPrice { value, source: PriceSource::Snapshot })
    })?;

    Some(SelectedPrice { value: round_price(selected.value, precision), ..selected })
}

/// Convenience wrapper returning only the value.
pub fn selected_price(pair: CurrencyPair, snapshot: Option<&Snapshot>, store: &FeedStore, precision: u32) -> Option<Decimal> {
    select_price(pair, snapshot, store, precision).map(|p| p.value)
}

/// Round half away from zero to `precision` places.
pub fn round_price(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
}

/// Fixed-width rendering: always exactly `precision` fractional digits.
pub fn format_price(value: Decimal, precision: u32) -> String {
    let rounded = round_price(value, precision);
    format!("{rounded:.prec$}", prec = precision as usize)
}
