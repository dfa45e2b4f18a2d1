//! USD-quoted currency pairs (`BTC-USD`).
//!
//! The feed identifies instruments by `product_id` strings; inside the crate
//! they are [`CurrencyPair`] values so an unknown product can never reach the
//! store by accident.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::asset::Asset;
use crate::error::PxError;

/// Quote currency shared by every tracked pair.
pub const QUOTE_CODE: &str = "USD";

/// A tracked asset quoted in USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyPair {
    base: Asset,
}

impl CurrencyPair {
    pub const fn new(base: Asset) -> Self {
        Self { base }
    }

    pub fn base(self) -> Asset {
        self.base
    }

    /// All pairs for the given assets, in the same order.
    pub fn for_assets(assets: &[Asset]) -> Vec<CurrencyPair> {
        assets.iter().copied().map(CurrencyPair::new).collect()
    }

    /// Product ids (`"BTC-USD"`, ...) for a subscription request.
    pub fn product_ids(pairs: &[CurrencyPair]) -> Vec<String> {
        pairs.iter().map(ToString::to_string).collect()
    }
}

impl From<Asset> for CurrencyPair {
    fn from(base: Asset) -> Self {
        Self::new(base)
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{QUOTE_CODE}", self.base)
    }
}

impl FromStr for CurrencyPair {
    type Err = PxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('-')
            .ok_or_else(|| PxError::Parse(format!("product id without quote: {s}")))?;
        if quote != QUOTE_CODE {
            return Err(PxError::Parse(format!("unsupported quote in {s}")));
        }
        let base = base.parse::<Asset>().map_err(|_| PxError::Parse(format!("untracked product: {s}")))?;
        Ok(Self::new(base))
    }
}

impl Serialize for CurrencyPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CurrencyPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
