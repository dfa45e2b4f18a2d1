//! The fixed set of tracked base assets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PxError;

/// Tracked cryptocurrency. Declaration order is the board's display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Btc,
    Eth,
    Usdt,
    Xrp,
    Doge,
    Sol,
}

impl Asset {
    /// Every tracked asset, in display order.
    pub const ALL: [Asset; 6] = [Asset::Btc, Asset::Eth, Asset::Usdt, Asset::Xrp, Asset::Doge, Asset::Sol];

    /// Ticker code as used on the wire (`"BTC"`).
    pub fn code(self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Eth => "ETH",
            Self::Usdt => "USDT",
            Self::Xrp => "XRP",
            Self::Doge => "DOGE",
            Self::Sol => "SOL",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

impl FromStr for Asset {
    type Err = PxError;

    /// Case-insensitive; `"btc"` and `"BTC"` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Asset::ALL
            .into_iter()
            .find(|a| a.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| PxError::Config(format!("unknown asset: {s}")))
    }
}
