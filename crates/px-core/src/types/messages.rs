//! Feed frames exchanged with the exchange's public market-data socket.
//!
//! Inbound frames are discriminated by their `type` field and decoded into
//! [`FeedMessage`]. Outbound frames are [`SubscribeRequest`] and
//! [`UnsubscribeRequest`].
//!
//! Price-like fields are exact decimals: the exchange sends them as strings
//! (`"65010.4567"`) and they must survive to display without float drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Aggressor side of the last trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Real-time price update for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerMessage {
    pub product_id: String,
    pub sequence: u64,
    pub price: Decimal,
    #[serde(default)]
    pub open_24h: Option<Decimal>,
    #[serde(default)]
    pub volume_24h: Option<Decimal>,
    #[serde(default)]
    pub low_24h: Option<Decimal>,
    #[serde(default)]
    pub high_24h: Option<Decimal>,
    #[serde(default)]
    pub volume_30d: Option<Decimal>,
    #[serde(default)]
    pub best_bid: Option<Decimal>,
    #[serde(default)]
    pub best_bid_size: Option<Decimal>,
    #[serde(default)]
    pub best_ask: Option<Decimal>,
    #[serde(default)]
    pub best_ask_size: Option<Decimal>,
    #[serde(default)]
    pub side: Option<Side>,
    /// ISO 8601 exchange timestamp.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub trade_id: Option<u64>,
    #[serde(default)]
    pub last_size: Option<Decimal>,
}

/// Liveness signal for one product. Carries no price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    pub product_id: String,
    pub sequence: u64,
    #[serde(default)]
    pub last_trade_id: Option<u64>,
    #[serde(default)]
    pub time: Option<String>,
}

/// Server acknowledgement listing the channels now active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionsAck {
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// Server-side rejection (bad product, bad channel, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedErrorFrame {
    pub message: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    Ticker(TickerMessage),
    Heartbeat(HeartbeatMessage),
    Subscriptions(SubscriptionsAck),
    Error(FeedErrorFrame),
}

impl FeedMessage {
    /// Discriminators this crate knows how to decode.
    pub const KNOWN_TYPES: [&'static str; 4] = ["ticker", "heartbeat", "subscriptions", "error"];

    /// Product id for per-product frames.
    pub fn product_id(&self) -> Option<&str> {
        match self {
            Self::Ticker(t) => Some(&t.product_id),
            Self::Heartbeat(h) => Some(&h.product_id),
            Self::Subscriptions(_) | Self::Error(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Well-known channel names.
pub const TICKER_CHANNEL: &str = "ticker";
pub const HEARTBEAT_CHANNEL: &str = "heartbeat";

/// A channel in a subscription: either a bare name (applies to the request's
/// `product_ids`) or a name scoped to its own product list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Channel {
    Name(String),
    Scoped { name: String, product_ids: Vec<String> },
}

impl Channel {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(n) | Self::Scoped { name: n, .. } => n,
        }
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Channel {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// `{"type":"subscribe","product_ids":[...],"channels":[...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "subscribe")]
pub struct SubscribeRequest {
    pub product_ids: Vec<String>,
    pub channels: Vec<Channel>,
}

/// `{"type":"unsubscribe","channels":[...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "unsubscribe")]
pub struct UnsubscribeRequest {
    pub channels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn decode_full_ticker() {
        let json = r#"{
            "type": "ticker",
            "sequence": 37475248783,
            "product_id": "ETH-USD",
            "price": "1285.22",
            "open_24h": "1310.79",
            "volume_24h": "245532.79269678",
            "low_24h": "1280.52",
            "high_24h": "1313.8",
            "volume_30d": "9788783.60117027",
            "best_bid": "1285.04",
            "best_bid_size": "0.46688654",
            "best_ask": "1285.27",
            "best_ask_size": "1.56637040",
            "side": "buy",
            "time": "2022-10-19T23:28:22.061769Z",
            "trade_id": 370843401,
            "last_size": "11.4396987"
        }"#;
        match serde_json::from_str::<FeedMessage>(json).unwrap() {
            FeedMessage::Ticker(t) => {
                assert_eq!(t.product_id, "ETH-USD");
                assert_eq!(t.sequence, 37475248783);
                assert_eq!(t.price, Decimal::from_str("1285.22").unwrap());
                assert_eq!(t.best_ask, Some(Decimal::from_str("1285.27").unwrap()));
                assert_eq!(t.side, Some(Side::Buy));
                assert_eq!(t.trade_id, Some(370843401));
            }
            other => panic!("expected Ticker, got {other:?}"),
        }
    }

    #[test]
    fn decode_heartbeat() {
        let json = r#"{"type":"heartbeat","sequence":90,"last_trade_id":20,
            "product_id":"BTC-USD","time":"2014-11-07T08:19:28.464459Z"}"#;
        let msg: FeedMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.product_id(), Some("BTC-USD"));
        assert!(matches!(msg, FeedMessage::Heartbeat(HeartbeatMessage { last_trade_id: Some(20), .. })));
    }

    #[test]
    fn decode_subscriptions_ack_with_scoped_channel() {
        let json = r#"{"type":"subscriptions","channels":[{"name":"ticker","product_ids":["ETH-USD"]}]}"#;
        let msg: FeedMessage = serde_json::from_str(json).unwrap();
        match msg {
            FeedMessage::Subscriptions(ack) => {
                assert_eq!(ack.channels.len(), 1);
                assert_eq!(ack.channels[0].name(), "ticker");
            }
            other => panic!("expected Subscriptions, got {other:?}"),
        }
    }

    #[test]
    fn subscribe_wire_shape() {
        let req = SubscribeRequest {
            product_ids: vec!["BTC-USD".into(), "ETH-USD".into()],
            channels: vec![TICKER_CHANNEL.into()],
        };
        let v: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "type": "subscribe",
                "product_ids": ["BTC-USD", "ETH-USD"],
                "channels": ["ticker"]
            })
        );
    }

    #[test]
    fn scoped_channel_serializes_as_object() {
        let ch = Channel::Scoped { name: "heartbeat".into(), product_ids: vec!["SOL-USD".into()] };
        assert_eq!(
            serde_json::to_value(&ch).unwrap(),
            serde_json::json!({"name": "heartbeat", "product_ids": ["SOL-USD"]})
        );
    }

    #[test]
    fn unsubscribe_wire_shape() {
        let req = UnsubscribeRequest { channels: vec!["ticker".into()] };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"type":"unsubscribe","channels":["ticker"]}"#
        );
    }
}
