//! Feed normalization service.
//!
//! Owns one WebSocket connection per registered exchange and pumps
//! every inbound frame through that exchange's adapter into the shared
//! [`PriceBook`] and the detector's event channel. Connections run and
//! fail independently; reconnect exhaustion on one exchange surfaces
//! as a bus event and never touches the others.

use arb_core::{ArbEvent, EventBus, ExchangeId, MarketKey, PairId, PriceSnapshot};
use arb_registry::MarketRegistry;
use arb_ws::{ConnectionConfig, ConnectionHandle, ConnectionManager};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapter::{AdapterCodec, AdapterRegistry, ExchangeAdapter};
use crate::book::PriceBook;
use crate::error::{FeedError, FeedResult};
use crate::event::MarketEvent;

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_ping_interval_ms() -> u64 {
    30_000
}

fn default_ping_timeout_ms() -> u64 {
    10_000
}

fn default_inbound_buffer() -> usize {
    1000
}

/// Connection tuning shared by every exchange feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Give up after this many consecutive failed attempts (0 = never).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    /// Raw-frame channel capacity per exchange.
    #[serde(default = "default_inbound_buffer")]
    pub inbound_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
            inbound_buffer: default_inbound_buffer(),
        }
    }
}

/// Per-exchange connection plus its routing plumbing.
struct ExchangeFeed {
    exchange: ExchangeId,
    adapter: Arc<dyn ExchangeAdapter>,
    manager: Arc<ConnectionManager>,
    handle: ConnectionHandle,
    /// Taken by `connect()`; None once routing is running.
    raw_rx: Mutex<Option<mpsc::Receiver<String>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Market-data feed service across all registered exchanges.
pub struct FeedNormalizer {
    registry: Arc<MarketRegistry>,
    adapters: Arc<AdapterRegistry>,
    book: Arc<PriceBook>,
    bus: EventBus,
    event_tx: mpsc::Sender<MarketEvent>,
    config: FeedConfig,
    feeds: DashMap<ExchangeId, Arc<ExchangeFeed>>,
    shutdown: Mutex<CancellationToken>,
}

impl FeedNormalizer {
    pub fn new(
        registry: Arc<MarketRegistry>,
        adapters: Arc<AdapterRegistry>,
        book: Arc<PriceBook>,
        bus: EventBus,
        event_tx: mpsc::Sender<MarketEvent>,
        config: FeedConfig,
    ) -> Self {
        Self {
            registry,
            adapters,
            book,
            bus,
            event_tx,
            config,
            feeds: DashMap::new(),
            shutdown: Mutex::new(CancellationToken::new()),
        }
    }

    /// Build one connection per registered exchange.
    ///
    /// Clears previous feeds and cached prices, so calling this after
    /// `stop()` restarts from a clean slate. Fails when a registered
    /// exchange has no adapter.
    pub fn initialize(&self) -> FeedResult<()> {
        self.feeds.clear();
        self.book.clear();
        *self.shutdown.lock() = CancellationToken::new();

        for exchange in self.registry.exchanges() {
            let adapter = self
                .adapters
                .get(&exchange.id)
                .ok_or_else(|| FeedError::NoAdapter(exchange.id.to_string()))?;

            let (raw_tx, raw_rx) = mpsc::channel(self.config.inbound_buffer);
            let connection = ConnectionConfig {
                url: exchange.ws_url.clone(),
                label: exchange.id.to_string(),
                max_reconnect_attempts: self.config.max_reconnect_attempts,
                reconnect_base_delay_ms: self.config.reconnect_base_delay_ms,
                reconnect_max_delay_ms: self.config.reconnect_max_delay_ms,
                ping_interval_ms: self.config.ping_interval_ms,
                ping_timeout_ms: self.config.ping_timeout_ms,
            };
            let manager = Arc::new(ConnectionManager::new(
                connection,
                Arc::new(AdapterCodec::new(adapter.clone())),
                raw_tx,
            ));
            let handle = manager.handle();

            self.feeds.insert(
                exchange.id.clone(),
                Arc::new(ExchangeFeed {
                    exchange: exchange.id.clone(),
                    adapter,
                    manager,
                    handle,
                    raw_rx: Mutex::new(Some(raw_rx)),
                    tasks: Mutex::new(Vec::new()),
                }),
            );
        }

        info!(exchanges = self.feeds.len(), "Feed normalizer initialized");
        Ok(())
    }

    /// Start the connection and routing tasks for one exchange.
    ///
    /// The connection task retries with backoff on its own; exhaustion
    /// emits `MaxReconnectAttemptsReached` and leaves the exchange down.
    pub fn connect(&self, exchange: &ExchangeId) -> FeedResult<()> {
        let feed = self.feed(exchange)?;

        let Some(raw_rx) = feed.raw_rx.lock().take() else {
            debug!(exchange = %exchange, "Connect called twice, already running");
            return Ok(());
        };

        let token = self.shutdown.lock().child_token();
        let route = tokio::spawn(route_messages(
            feed.exchange.clone(),
            feed.adapter.clone(),
            self.book.clone(),
            self.event_tx.clone(),
            raw_rx,
            token,
        ));

        let manager = feed.manager.clone();
        let bus = self.bus.clone();
        let exchange_id = feed.exchange.clone();
        let run = tokio::spawn(async move {
            match manager.run().await {
                Ok(()) => info!(exchange = %exchange_id, "Feed connection stopped"),
                Err(e) => {
                    error!(exchange = %exchange_id, error = %e, "Feed connection gave up");
                    bus.emit(ArbEvent::MaxReconnectAttemptsReached {
                        exchange: exchange_id.clone(),
                    });
                }
            }
        });

        let mut tasks = feed.tasks.lock();
        tasks.push(run);
        tasks.push(route);
        Ok(())
    }

    /// Start every exchange connection; failures are independent.
    pub fn connect_all(&self) {
        let exchanges: Vec<ExchangeId> = self
            .feeds
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for exchange in exchanges {
            if let Err(e) = self.connect(&exchange) {
                warn!(exchange = %exchange, error = %e, "Failed to start feed connection");
            }
        }
    }

    /// Mark (exchange, pair) as desired and subscribe on the wire when
    /// connected. Returns false when the pair was already subscribed;
    /// the wire frame is not re-sent in that case.
    pub fn subscribe(&self, exchange: &ExchangeId, pair: &PairId) -> FeedResult<bool> {
        let feed = self.feed(exchange)?;
        let added = feed.handle.subscribe(pair.as_str());
        if added {
            info!(exchange = %exchange, pair = %pair, "Subscribed");
        } else {
            debug!(exchange = %exchange, pair = %pair, "Already subscribed");
        }
        Ok(added)
    }

    /// Remove (exchange, pair) from the desired set and unsubscribe on
    /// the wire when connected.
    pub fn unsubscribe(&self, exchange: &ExchangeId, pair: &PairId) -> FeedResult<bool> {
        let feed = self.feed(exchange)?;
        let removed = feed.handle.unsubscribe(pair.as_str());
        if removed {
            info!(exchange = %exchange, pair = %pair, "Unsubscribed");
        }
        Ok(removed)
    }

    /// Latest snapshot for (exchange, pair); never blocks.
    pub fn latest_price(&self, exchange: &ExchangeId, pair: &PairId) -> Option<PriceSnapshot> {
        self.book
            .get(&MarketKey::new(exchange.clone(), pair.clone()))
    }

    pub fn is_connected(&self, exchange: &ExchangeId) -> bool {
        self.feeds
            .get(exchange)
            .map(|feed| feed.handle.is_connected())
            .unwrap_or(false)
    }

    /// Desired subscriptions for one exchange, sorted.
    pub fn subscriptions(&self, exchange: &ExchangeId) -> Vec<String> {
        self.feeds
            .get(exchange)
            .map(|feed| feed.handle.topics())
            .unwrap_or_default()
    }

    /// Withdraw every subscription and shut every connection down.
    ///
    /// Idempotent. A fresh `initialize()` is required before
    /// reconnecting; `initialize()` + `connect_all()` afterwards
    /// behaves like a cold start.
    pub fn stop(&self) {
        self.shutdown.lock().cancel();

        for feed in self.feeds.iter() {
            for topic in feed.handle.topics() {
                feed.handle.unsubscribe(&topic);
            }
            feed.manager.shutdown();
            for task in feed.tasks.lock().drain(..) {
                task.abort();
            }
        }
        info!("Feed normalizer stopped");
    }

    fn feed(&self, exchange: &ExchangeId) -> FeedResult<Arc<ExchangeFeed>> {
        self.feeds
            .get(exchange)
            .map(|entry| entry.clone())
            .ok_or_else(|| FeedError::UnknownExchange(exchange.to_string()))
    }
}

/// Pump raw frames from one connection through its adapter into the
/// price book and the detector channel. Malformed frames are logged
/// and dropped.
async fn route_messages(
    exchange: ExchangeId,
    adapter: Arc<dyn ExchangeAdapter>,
    book: Arc<PriceBook>,
    event_tx: mpsc::Sender<MarketEvent>,
    mut raw_rx: mpsc::Receiver<String>,
    shutdown: CancellationToken,
) {
    loop {
        let raw = tokio::select! {
            () = shutdown.cancelled() => break,
            maybe = raw_rx.recv() => match maybe {
                Some(raw) => raw,
                None => break,
            },
        };

        let events = match adapter.parse_message(&raw) {
            Ok(events) => events,
            Err(e) => {
                warn!(exchange = %exchange, error = %e, "Dropping unparseable frame");
                continue;
            }
        };

        for event in events {
            book.apply(&event);
            if event_tx.send(event).await.is_err() {
                debug!(exchange = %exchange, "Event receiver dropped, stopping routing");
                return;
            }
        }
    }
    debug!(exchange = %exchange, "Message routing stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_core::Exchange;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn sample_exchange(id: &str) -> Exchange {
        Exchange {
            id: ExchangeId::new(id),
            name: id.to_string(),
            ws_url: format!("wss://{id}.example.com/ws"),
            rest_url: format!("https://{id}.example.com"),
            fee_rate: dec!(0.001),
            withdrawal_fees: HashMap::new(),
            supported_assets: Vec::new(),
        }
    }

    fn normalizer_with(
        exchanges: &[&str],
    ) -> (FeedNormalizer, mpsc::Receiver<MarketEvent>) {
        let registry = Arc::new(MarketRegistry::new());
        for id in exchanges {
            registry.register_exchange(sample_exchange(id)).unwrap();
        }
        let (event_tx, event_rx) = mpsc::channel(64);
        let normalizer = FeedNormalizer::new(
            registry,
            Arc::new(AdapterRegistry::with_defaults()),
            Arc::new(PriceBook::new()),
            EventBus::default(),
            event_tx,
            FeedConfig::default(),
        );
        (normalizer, event_rx)
    }

    #[test]
    fn test_initialize_builds_feeds() {
        let (normalizer, _rx) = normalizer_with(&["binance", "coinbase"]);
        normalizer.initialize().unwrap();

        assert!(!normalizer.is_connected(&ExchangeId::new("binance")));
        assert!(normalizer
            .subscriptions(&ExchangeId::new("coinbase"))
            .is_empty());
    }

    #[test]
    fn test_initialize_requires_adapter() {
        let (normalizer, _rx) = normalizer_with(&["kraken"]);
        assert!(matches!(
            normalizer.initialize(),
            Err(FeedError::NoAdapter(_))
        ));
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let (normalizer, _rx) = normalizer_with(&["binance"]);
        normalizer.initialize().unwrap();

        let binance = ExchangeId::new("binance");
        let pair = PairId::new("BTC", "USDT");

        assert!(normalizer.subscribe(&binance, &pair).unwrap());
        assert!(!normalizer.subscribe(&binance, &pair).unwrap());
        assert_eq!(normalizer.subscriptions(&binance), vec!["BTC/USDT"]);

        assert!(normalizer.unsubscribe(&binance, &pair).unwrap());
        assert!(normalizer.subscriptions(&binance).is_empty());
    }

    #[test]
    fn test_subscribe_unknown_exchange() {
        let (normalizer, _rx) = normalizer_with(&["binance"]);
        normalizer.initialize().unwrap();

        let result = normalizer.subscribe(&ExchangeId::new("kraken"), &PairId::new("BTC", "USDT"));
        assert!(matches!(result, Err(FeedError::UnknownExchange(_))));
    }

    #[test]
    fn test_latest_price_reads_book() {
        let (normalizer, _rx) = normalizer_with(&["binance"]);
        normalizer.initialize().unwrap();

        let binance = ExchangeId::new("binance");
        let pair = PairId::new("BTC", "USDT");
        assert!(normalizer.latest_price(&binance, &pair).is_none());

        let key = MarketKey::new(binance.clone(), pair.clone());
        normalizer
            .book
            .apply_ticker(&key, &arb_core::TickerUpdate::new(dec!(100), dec!(101), None));

        let snapshot = normalizer.latest_price(&binance, &pair).unwrap();
        assert_eq!(snapshot.bid, dec!(100));
    }

    #[tokio::test]
    async fn test_route_messages_drops_bad_frames() {
        let adapter = Arc::new(crate::adapters::BinanceAdapter::new());
        adapter.subscribe_message(&PairId::new("BTC", "USDT"));

        let book = Arc::new(PriceBook::new());
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let (raw_tx, raw_rx) = mpsc::channel(16);
        let token = CancellationToken::new();

        let task = tokio::spawn(route_messages(
            ExchangeId::new("binance"),
            adapter as Arc<dyn ExchangeAdapter>,
            book.clone(),
            event_tx,
            raw_rx,
            token.clone(),
        ));

        raw_tx.send("garbage".to_string()).await.unwrap();
        raw_tx
            .send(
                r#"{"stream":"btcusdt@bookTicker","data":{"b":"100.0","a":"101.0"}}"#.to_string(),
            )
            .await
            .unwrap();

        // Only the well-formed frame comes through.
        let event = event_rx.recv().await.unwrap();
        assert_eq!(event.key().to_string(), "binance:BTC/USDT");

        let key = MarketKey::new(ExchangeId::new("binance"), PairId::new("BTC", "USDT"));
        assert_eq!(book.get(&key).unwrap().bid, dec!(100.0));

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_clears_subscriptions() {
        let (normalizer, _rx) = normalizer_with(&["binance"]);
        normalizer.initialize().unwrap();

        let binance = ExchangeId::new("binance");
        normalizer
            .subscribe(&binance, &PairId::new("BTC", "USDT"))
            .unwrap();
        normalizer.connect(&binance).unwrap();

        normalizer.stop();
        assert!(normalizer.subscriptions(&binance).is_empty());
        assert!(!normalizer.is_connected(&binance));

        // Restart behaves like a cold start.
        normalizer.initialize().unwrap();
        assert!(normalizer.subscriptions(&binance).is_empty());
    }
}
