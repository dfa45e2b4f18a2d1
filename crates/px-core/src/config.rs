//! Configuration parsing for the price board.
//!
//! Settings come from an optional JSON file. Every field is optional and
//! falls back to the public Coinbase endpoints, the full asset list and the
//! ticker channel, so running without a file is the normal case.
//!
//! # Example config
//!
//! ```json
//! {
//!   "app": { "module_name": "px-runner", "log_path": "/tmp/log" },
//!   "feed": {
//!     "ws_url": "wss://ws-feed.exchange.coinbase.com",
//!     "channels": ["ticker"],
//!     "reconnect": { "enabled": false }
//!   },
//!   "rest": { "rates_url": "https://api.coinbase.com/v2/exchange-rates", "timeout_sec": 10 },
//!   "assets": ["BTC", "ETH", "USDT", "XRP", "DOGE", "SOL"],
//!   "display": { "precision": 3 }
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::error::PxError;
use crate::types::{Asset, TICKER_CHANNEL};
use crate::ws::ReconnectPolicy;

pub const DEFAULT_WS_URL: &str = "wss://ws-feed.exchange.coinbase.com";
pub const DEFAULT_RATES_URL: &str = "https://api.coinbase.com/v2/exchange-rates";
pub const DEFAULT_PRECISION: u32 = 3;

/// Largest scale a `rust_decimal::Decimal` can carry.
const MAX_PRECISION: u32 = 28;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: ModuleMeta,
    pub feed: FeedConfig,
    pub rest: RestConfig,
    /// Tracked assets (default: all six, in display order).
    pub assets: Option<Vec<Asset>>,
    pub display: DisplayConfig,
}

impl AppConfig {
    /// Tracked assets, deduplicated, in the order given.
    pub fn effective_assets(&self) -> Vec<Asset> {
        match &self.assets {
            Some(list) if !list.is_empty() => {
                let mut out: Vec<Asset> = Vec::with_capacity(list.len());
                for a in list {
                    if !out.contains(a) {
                        out.push(*a);
                    }
                }
                out
            }
            _ => Asset::ALL.to_vec(),
        }
    }

    /// Reject settings that would only fail later at connect or render time.
    pub fn validate(&self) -> Result<(), PxError> {
        let ws_url = self.feed.effective_ws_url();
        let parsed = url::Url::parse(&ws_url).map_err(|e| PxError::Config(format!("feed.ws_url {ws_url}: {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(PxError::Config(format!("feed.ws_url must be ws:// or wss://, got {ws_url}")));
        }

        let rates_url = self.rest.effective_rates_url();
        url::Url::parse(&rates_url).map_err(|e| PxError::Config(format!("rest.rates_url {rates_url}: {e}")))?;

        if self.feed.effective_channels().is_empty() {
            return Err(PxError::Config("feed.channels must not be empty".into()));
        }

        let precision = self.display.effective_precision();
        if precision > MAX_PRECISION {
            return Err(PxError::Config(format!("display.precision {precision} exceeds {MAX_PRECISION}")));
        }

        // Checked on the effective values so a lone override is compared
        // against the other field's default.
        if let Some(policy) = self.feed.reconnect_policy() {
            if policy.initial_backoff.is_zero() {
                return Err(PxError::Config("feed.reconnect.initial_backoff_ms must be > 0".into()));
            }
            if policy.max_backoff < policy.initial_backoff {
                return Err(PxError::Config(format!(
                    "feed.reconnect.max_backoff_ms ({:?}) is below initial_backoff_ms ({:?})",
                    policy.max_backoff, policy.initial_backoff
                )));
            }
        }
        Ok(())
    }
}

/// Module metadata block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// Live feed settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedConfig {
    pub ws_url: Option<String>,

    /// Channels to subscribe (default: `["ticker"]`).
    pub channels: Option<Vec<String>>,

    /// Ping interval in seconds; unset means no client pings.
    pub ping_interval_sec: Option<u64>,

    /// Opt-in reconnect. Absent or disabled means manual-only reconnection.
    pub reconnect: Option<ReconnectConfig>,

    /// Extra HTTP headers for the WebSocket handshake.
    pub extra_headers: Option<HashMap<String, String>>,
}

impl FeedConfig {
    pub fn effective_ws_url(&self) -> String {
        self.ws_url.clone().unwrap_or_else(|| DEFAULT_WS_URL.to_string())
    }

    pub fn effective_channels(&self) -> Vec<String> {
        self.channels.clone().unwrap_or_else(|| vec![TICKER_CHANNEL.to_string()])
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        self.ping_interval_sec.filter(|s| *s > 0).map(Duration::from_secs)
    }

    /// The reconnect policy, only when explicitly enabled.
    pub fn reconnect_policy(&self) -> Option<ReconnectPolicy> {
        let cfg = self.reconnect.as_ref().filter(|r| r.enabled.unwrap_or(false))?;
        let defaults = ReconnectPolicy::default();
        Some(ReconnectPolicy {
            initial_backoff: cfg.initial_backoff_ms.map(Duration::from_millis).unwrap_or(defaults.initial_backoff),
            max_backoff: cfg.max_backoff_ms.map(Duration::from_millis).unwrap_or(defaults.max_backoff),
        })
    }
}

/// Reconnect block of [`FeedConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconnectConfig {
    pub enabled: Option<bool>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

/// Snapshot endpoint settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestConfig {
    pub rates_url: Option<String>,
    /// Per-request timeout in seconds (default: 10).
    pub timeout_sec: Option<u64>,
}

impl RestConfig {
    pub fn effective_rates_url(&self) -> String {
        self.rates_url.clone().unwrap_or_else(|| DEFAULT_RATES_URL.to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec.unwrap_or(10))
    }
}

/// Board rendering settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfig {
    /// Decimal places shown for prices (default: 3).
    pub precision: Option<u32>,
    /// Board redraw period while the feed is live, in ms (default: 1000).
    pub render_interval_ms: Option<u64>,
}

impl DisplayConfig {
    pub fn effective_precision(&self) -> u32 {
        self.precision.unwrap_or(DEFAULT_PRECISION)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.unwrap_or(1000).max(50))
    }
}

/// Load, parse and validate a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = parse_config(&content).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> anyhow::Result<AppConfig> {
    let config: AppConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}
