//! Live feed connection manager.
//!
//! Owns at most one transport and walks a three-state machine:
//!
//! ```text
//!  Disconnected ──activate──► Connecting ──Opened / send subscribe──► Connected
//!       ▲                        ▲  │                                    │
//!       │                        │  └──────── Closed(final) ─────────────┤
//!       │                        └────────── Closed(retrying) ───────────┤
//!       └──────────────────────── deactivate (any state) ────────────────┘
//! ```
//!
//! `activate` outside `Disconnected` is a no-op, so a second toggle can never
//! leak a transport or resend the subscription. Without an opt-in reconnect
//! policy on the connector, a dropped socket stays dropped until the user
//! activates again.
//!
//! The manager is driven by its owner: call [`FeedManager::next_event`] (cancel
//! safe, suitable for `tokio::select!`) and hand the result to
//! [`FeedManager::handle_event`]. All store writes happen there.

use px_core::error::PxError;
use px_core::ws::{Connector, Transport, WsEvent};
use px_core::{Channel, CurrencyPair, SubscribeRequest, UnsubscribeRequest};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{self, Dispatched};
use crate::store::SharedStore;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for FeedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Live feed connection manager. See the module docs for the state machine.
pub struct FeedManager {
    /// Feed endpoint.
    url: String,
    connector: Box<dyn Connector>,
    store: SharedStore,
    state: FeedState,
    transport: Option<Box<dyn Transport>>,
    events: Option<mpsc::UnboundedReceiver<WsEvent>>,
    /// Request sent on every ready signal of the current activation.
    subscription: Option<SubscribeRequest>,
}

impl FeedManager {
    pub fn new(url: impl Into<String>, connector: Box<dyn Connector>, store: SharedStore) -> Self {
        Self {
            url: url.into(),
            connector,
            store,
            state: FeedState::Disconnected,
            transport: None,
            events: None,
            subscription: None,
        }
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == FeedState::Connected
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Open a transport and arrange to subscribe `pairs` on `channels` once
    /// it is ready.
    ///
    /// Returns `Ok(false)` without side effects when already connecting or
    /// connected. A transport that cannot even be started is reported as
    /// [`PxError::WebSocket`] and leaves the manager disconnected.
    pub fn activate(&mut self, pairs: &[CurrencyPair], channels: Vec<Channel>) -> Result<bool, PxError> {
        if self.state != FeedState::Disconnected {
            debug!("[feed] activate ignored: already {}", self.state);
            return Ok(false);
        }

        let handle = self.connector.open(&self.url).map_err(|e| {
            error!("[feed] failed to open transport to {}: {e}", self.url);
            PxError::WebSocket(e.to_string())
        })?;

        self.subscription = Some(SubscribeRequest { product_ids: CurrencyPair::product_ids(pairs), channels });
        self.transport = Some(handle.transport);
        self.events = Some(handle.events);
        self.state = FeedState::Connecting;
        info!("[feed] connecting to {} for {} pair(s)", self.url, pairs.len());
        Ok(true)
    }

    /// Close the transport (if any) and mark the store disconnected.
    /// Valid in every state; repeated calls only log.
    pub async fn deactivate(&mut self) {
        match self.transport.take() {
            Some(mut transport) => {
                transport.close().await;
                info!("[feed] disconnected");
            }
            None => {
                let err = PxError::InvalidState("feed is not connected".into());
                error!("[feed] deactivate: {err}");
            }
        }
        self.events = None;
        self.subscription = None;
        self.store.write().set_connected(false);
        self.state = FeedState::Disconnected;
    }

    /// Flip the feed: tear it down from any non-`Disconnected` state
    /// (including a pending first connect or a reconnect gap), otherwise
    /// activate. Returns the resulting state.
    pub async fn toggle(&mut self, pairs: &[CurrencyPair], channels: Vec<Channel>) -> Result<FeedState, PxError> {
        if self.state == FeedState::Disconnected {
            self.activate(pairs, channels)?;
        } else {
            self.deactivate().await;
        }
        Ok(self.state)
    }

    /// Send an unsubscribe frame for `channels`.
    ///
    /// Only meaningful while connected; otherwise logs and returns
    /// `Ok(false)` without sending anything.
    pub async fn unsubscribe(&self, channels: Vec<String>) -> Result<bool, PxError> {
        let transport = match (self.state, self.transport.as_ref()) {
            (FeedState::Connected, Some(t)) => t,
            _ => {
                let err = PxError::InvalidState(format!("cannot unsubscribe while {}", self.state));
                error!("[feed] {err}");
                return Ok(false);
            }
        };

        let frame = serde_json::to_string(&UnsubscribeRequest { channels })
            .map_err(|e| PxError::Parse(e.to_string()))?;
        transport.send(frame.clone()).await?;
        info!("[feed] sent unsubscribe: {frame}");
        Ok(true)
    }

    /// Wait for the next transport event. Pending forever while no transport
    /// is open. Cancel safe.
    pub async fn next_event(&mut self) -> WsEvent {
        let Some(events) = self.events.as_mut() else {
            return std::future::pending().await;
        };
        match events.recv().await {
            Some(event) => event,
            None => {
                self.events = None;
                WsEvent::Closed { reason: "transport task ended".into(), reconnecting: false }
            }
        }
    }

    /// Apply one transport event. Returns the dispatch outcome for data frames.
    pub async fn handle_event(&mut self, event: WsEvent) -> Option<Dispatched> {
        match event {
            WsEvent::Opened => {
                self.on_opened().await;
                None
            }
            WsEvent::Text(frame) => {
                if self.state == FeedState::Disconnected {
                    debug!("[feed] frame after disconnect dropped");
                    return None;
                }
                let outcome = dispatcher::dispatch(&mut self.store.write(), frame.as_bytes());
                Some(outcome)
            }
            WsEvent::Error(e) => {
                warn!("[feed] transport error: {e}");
                None
            }
            WsEvent::Closed { reason, reconnecting } => {
                self.on_closed(reason, reconnecting).await;
                None
            }
        }
    }

    /// [`next_event`](Self::next_event) followed by [`handle_event`](Self::handle_event).
    pub async fn pump(&mut self) -> Option<Dispatched> {
        let event = self.next_event().await;
        self.handle_event(event).await
    }

    async fn on_opened(&mut self) {
        if self.state != FeedState::Connecting {
            debug!("[feed] ready signal ignored while {}", self.state);
            return;
        }
        let (Some(transport), Some(sub)) = (self.transport.as_ref(), self.subscription.as_ref()) else {
            return;
        };

        let frame = match serde_json::to_string(sub) {
            Ok(f) => f,
            Err(e) => {
                error!("[feed] failed to encode subscribe request: {e}");
                return;
            }
        };

        match transport.send(frame.clone()).await {
            Ok(()) => {
                info!("[feed] subscribed: {frame}");
                self.store.write().set_connected(true);
                self.state = FeedState::Connected;
            }
            Err(e) => error!("[feed] subscribe send failed: {e}"),
        }
    }

    async fn on_closed(&mut self, reason: String, reconnecting: bool) {
        self.store.write().set_connected(false);

        if reconnecting && self.transport.is_some() {
            warn!("[feed] connection lost ({reason}); waiting for reconnect");
            self.state = FeedState::Connecting;
            return;
        }

        warn!("[feed] connection closed ({reason})");
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.events = None;
        self.subscription = None;
        self.state = FeedState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use px_core::ws::TransportHandle;
    use px_core::{Asset, TICKER_CHANNEL};

    use super::*;
    use crate::selector::selected_price;
    use crate::store::FeedStore;

    #[derive(Default)]
    struct Wire {
        opened: AtomicUsize,
        closed: AtomicUsize,
        sent: Mutex<Vec<String>>,
        inject: Mutex<Vec<mpsc::UnboundedSender<WsEvent>>>,
    }

    impl Wire {
        fn push(&self, event: WsEvent) {
            let guard = self.inject.lock();
            guard.last().expect("no transport opened").send(event).unwrap();
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    struct FakeTransport(Arc<Wire>);

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, frame: String) -> Result<(), PxError> {
            self.0.sent.lock().push(frame);
            Ok(())
        }

        async fn close(&mut self) {
            self.0.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeConnector(Arc<Wire>);

    impl Connector for FakeConnector {
        fn open(&self, _url: &str) -> Result<TransportHandle, PxError> {
            self.0.opened.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::unbounded_channel();
            self.0.inject.lock().push(tx);
            Ok(TransportHandle { transport: Box::new(FakeTransport(self.0.clone())), events: rx })
        }
    }

    fn setup() -> (FeedManager, Arc<Wire>, Vec<CurrencyPair>) {
        let wire = Arc::new(Wire::default());
        let pairs = CurrencyPair::for_assets(&Asset::ALL);
        let store = FeedStore::new(pairs.clone()).shared();
        let mgr = FeedManager::new("wss://feed.test", Box::new(FakeConnector(wire.clone())), store);
        (mgr, wire, pairs)
    }

    async fn connect(mgr: &mut FeedManager, wire: &Wire, pairs: &[CurrencyPair]) {
        assert!(mgr.activate(pairs, vec![TICKER_CHANNEL.into()]).unwrap());
        wire.push(WsEvent::Opened);
        mgr.pump().await;
    }

    #[tokio::test]
    async fn ready_signal_sends_exactly_one_subscribe() {
        let (mut mgr, wire, pairs) = setup();
        assert!(mgr.activate(&pairs, vec![TICKER_CHANNEL.into()]).unwrap());
        assert_eq!(mgr.state(), FeedState::Connecting);
        assert!(wire.sent().is_empty());
        assert!(!mgr.store().read().is_connected());

        wire.push(WsEvent::Opened);
        mgr.pump().await;

        let sent = wire.sent();
        assert_eq!(sent.len(), 1);
        let v: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "type": "subscribe",
                "product_ids": ["BTC-USD", "ETH-USD", "USDT-USD", "XRP-USD", "DOGE-USD", "SOL-USD"],
                "channels": ["ticker"]
            })
        );
        assert_eq!(mgr.state(), FeedState::Connected);
        assert!(mgr.store().read().is_connected());
    }

    #[tokio::test]
    async fn second_activate_is_a_no_op() {
        let (mut mgr, wire, pairs) = setup();
        assert!(mgr.activate(&pairs, vec![TICKER_CHANNEL.into()]).unwrap());
        assert!(!mgr.activate(&pairs, vec![TICKER_CHANNEL.into()]).unwrap());

        wire.push(WsEvent::Opened);
        mgr.pump().await;
        assert!(!mgr.activate(&pairs, vec![TICKER_CHANNEL.into()]).unwrap());

        assert_eq!(wire.opened.load(Ordering::SeqCst), 1);
        assert_eq!(wire.sent().len(), 1);
    }

    #[tokio::test]
    async fn streamed_ticker_drives_selected_price() {
        let (mut mgr, wire, pairs) = setup();
        connect(&mut mgr, &wire, &pairs).await;

        wire.push(WsEvent::Text(
            r#"{"type":"ticker","product_id":"BTC-USD","price":"65010.4567","sequence":7}"#.into(),
        ));
        let outcome = mgr.pump().await;
        assert_eq!(outcome, Some(Dispatched::Ticker(CurrencyPair::new(Asset::Btc))));

        let stale = px_core::Snapshot {
            currency: Asset::Btc,
            rates: [("USD".to_string(), "65000.123".to_string())].into(),
        };
        let store = mgr.store().read();
        let price = selected_price(CurrencyPair::new(Asset::Btc), Some(&stale), &store, 3).unwrap();
        assert_eq!(price.to_string(), "65010.457");
    }

    #[tokio::test]
    async fn deactivate_is_idempotent() {
        let (mut mgr, wire, pairs) = setup();

        // Never connected: still clears the flag, no transport closed.
        mgr.deactivate().await;
        assert!(!mgr.store().read().is_connected());
        assert_eq!(wire.closed.load(Ordering::SeqCst), 0);

        connect(&mut mgr, &wire, &pairs).await;
        assert!(mgr.store().read().is_connected());

        mgr.deactivate().await;
        mgr.deactivate().await;
        assert_eq!(mgr.state(), FeedState::Disconnected);
        assert!(!mgr.store().read().is_connected());
        assert_eq!(wire.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsolicited_close_disconnects_without_retry() {
        let (mut mgr, wire, pairs) = setup();
        connect(&mut mgr, &wire, &pairs).await;

        wire.push(WsEvent::Closed { reason: "network".into(), reconnecting: false });
        mgr.pump().await;

        assert_eq!(mgr.state(), FeedState::Disconnected);
        assert!(!mgr.store().read().is_connected());
        assert_eq!(wire.opened.load(Ordering::SeqCst), 1);

        // The user can reconnect manually.
        assert!(mgr.activate(&pairs, vec![TICKER_CHANNEL.into()]).unwrap());
        assert_eq!(wire.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn toggle_stops_a_pending_reconnect() {
        let (mut mgr, wire, pairs) = setup();
        connect(&mut mgr, &wire, &pairs).await;

        wire.push(WsEvent::Closed { reason: "reset".into(), reconnecting: true });
        mgr.pump().await;
        assert_eq!(mgr.state(), FeedState::Connecting);
        assert!(!mgr.store().read().is_connected());

        let state = mgr.toggle(&pairs, vec![TICKER_CHANNEL.into()]).await.unwrap();
        assert_eq!(state, FeedState::Disconnected);
        assert_eq!(wire.closed.load(Ordering::SeqCst), 1);
        assert_eq!(wire.opened.load(Ordering::SeqCst), 1);

        let state = mgr.toggle(&pairs, vec![TICKER_CHANNEL.into()]).await.unwrap();
        assert_eq!(state, FeedState::Connecting);
        assert_eq!(wire.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn toggle_cancels_a_hanging_first_connect() {
        let (mut mgr, wire, pairs) = setup();
        assert_eq!(mgr.toggle(&pairs, vec![TICKER_CHANNEL.into()]).await.unwrap(), FeedState::Connecting);
        assert_eq!(mgr.toggle(&pairs, vec![TICKER_CHANNEL.into()]).await.unwrap(), FeedState::Disconnected);
        assert_eq!(wire.closed.load(Ordering::SeqCst), 1);
        assert!(wire.sent().is_empty());
    }

    #[tokio::test]
    async fn retrying_close_resubscribes_on_next_ready() {
        let (mut mgr, wire, pairs) = setup();
        connect(&mut mgr, &wire, &pairs).await;

        wire.push(WsEvent::Closed { reason: "reset".into(), reconnecting: true });
        mgr.pump().await;
        assert_eq!(mgr.state(), FeedState::Connecting);
        assert!(!mgr.store().read().is_connected());

        wire.push(WsEvent::Opened);
        mgr.pump().await;
        assert_eq!(mgr.state(), FeedState::Connected);
        assert_eq!(wire.sent().len(), 2);
        assert_eq!(wire.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_error_keeps_connection() {
        let (mut mgr, wire, pairs) = setup();
        connect(&mut mgr, &wire, &pairs).await;

        wire.push(WsEvent::Error("bad frame".into()));
        mgr.pump().await;
        wire.push(WsEvent::Text("{garbage".into()));
        assert!(matches!(mgr.pump().await, Some(Dispatched::Dropped(_))));

        assert_eq!(mgr.state(), FeedState::Connected);
        assert!(mgr.store().read().is_connected());
    }

    #[tokio::test]
    async fn unsubscribe_only_when_connected() {
        let (mut mgr, wire, pairs) = setup();
        assert!(!mgr.unsubscribe(vec!["ticker".into()]).await.unwrap());
        assert!(wire.sent().is_empty());

        connect(&mut mgr, &wire, &pairs).await;
        assert!(mgr.unsubscribe(vec!["ticker".into()]).await.unwrap());
        let sent = wire.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], r#"{"type":"unsubscribe","channels":["ticker"]}"#);
    }

    #[tokio::test]
    async fn ended_event_stream_counts_as_final_close() {
        let (mut mgr, wire, pairs) = setup();
        connect(&mut mgr, &wire, &pairs).await;

        wire.inject.lock().clear();
        mgr.pump().await;
        assert_eq!(mgr.state(), FeedState::Disconnected);
        assert!(!mgr.store().read().is_connected());
    }
}
