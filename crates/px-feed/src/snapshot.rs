//! One-shot rate snapshots over REST.
//!
//! `GET <rates_url>?currency=<ASSET>` returns
//! `{"data":{"currency":"BTC","rates":{"USD":"65000.123",...}}}`.
//! A response is only accepted when it is 2xx, parses, and carries a USD rate.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use px_core::{Asset, QUOTE_CODE, RatesResponse, Snapshot, config::RestConfig, error::PxError};
use tracing::{debug, info, warn};

use crate::RatesSource;

/// REST snapshot client.
pub struct SnapshotFetcher {
    /// Shared HTTP client.
    http: reqwest::Client,
    /// Rates endpoint (e.g. `https://api.coinbase.com/v2/exchange-rates`).
    rates_url: String,
}

impl SnapshotFetcher {
    pub fn new(rates_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("px-feed/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, rates_url: rates_url.into() })
    }

    /// Build from the `rest` config section.
    pub fn from_config(cfg: &RestConfig) -> anyhow::Result<Self> {
        Self::new(cfg.effective_rates_url(), cfg.timeout())
    }

    async fn fetch_once(&self, asset: Asset) -> anyhow::Result<Snapshot> {
        debug!("[rest] GET {}?currency={asset}", self.rates_url);

        let body = self
            .http
            .get(&self.rates_url)
            .query(&[("currency", asset.code())])
            .send()
            .await
            .context("rates request failed")?
            .error_for_status()
            .context("rates HTTP error")?
            .text()
            .await
            .context("rates body read failed")?;

        parse_rates_body(asset, &body)
    }
}

#[async_trait]
impl RatesSource for SnapshotFetcher {
    async fn fetch(&self, asset: Asset) -> Result<Snapshot, PxError> {
        match self.fetch_once(asset).await {
            Ok(snapshot) => {
                info!("[rest] {asset} snapshot: USD={}", snapshot.rate(QUOTE_CODE).unwrap_or("?"));
                Ok(snapshot)
            }
            Err(e) => {
                warn!("[rest] {asset} fetch failed: {e:#}");
                Err(PxError::Fetch(format!("{asset}: {e:#}")))
            }
        }
    }
}

/// Decode a rates response body for `asset`.
pub fn parse_rates_body(asset: Asset, body: &str) -> anyhow::Result<Snapshot> {
    let resp: RatesResponse = serde_json::from_str(body).context("malformed rates body")?;
    let snapshot = resp.data;

    if snapshot.currency != asset {
        anyhow::bail!("asked for {asset}, got rates for {}", snapshot.currency);
    }
    if snapshot.usd_rate().is_none() {
        anyhow::bail!("no usable {QUOTE_CODE} rate for {asset}");
    }
    Ok(snapshot)
}
