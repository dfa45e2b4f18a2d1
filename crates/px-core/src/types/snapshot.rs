//! REST rate snapshots.
//!
//! A snapshot is one `exchange-rates` response for one base asset. It is
//! replaced wholesale on every fetch and never merged with a previous one.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::Asset;
use super::pair::QUOTE_CODE;

/// Rates for one base asset, keyed by quote code, as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub currency: Asset,
    pub rates: HashMap<String, String>,
}

impl Snapshot {
    /// Raw rate string for `code`, if present.
    pub fn rate(&self, code: &str) -> Option<&str> {
        self.rates.get(code).map(String::as_str)
    }

    /// The USD rate as a decimal. `None` if missing or not a number.
    pub fn usd_rate(&self) -> Option<Decimal> {
        self.rate(QUOTE_CODE).and_then(|r| Decimal::from_str(r).ok())
    }
}

/// Envelope of the rates endpoint: `{ "data": { currency, rates } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct RatesResponse {
    pub data: Snapshot,
}
