//! Per-exchange adapter seam.
//!
//! One [`ExchangeAdapter`] per venue translates between the canonical
//! domain (pairs, ticker/book events) and the vendor wire protocol
//! (symbols, subscribe frames, payload shapes). Adapters are selected
//! through [`AdapterRegistry`] keyed by exchange id.

use arb_core::{DepthLevel, ExchangeId, PairId};
use arb_ws::SubscriptionCodec;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::{FeedError, FeedResult};
use crate::event::MarketEvent;

/// Vendor-specific message handling for one exchange.
///
/// Implementations must be cheap to call concurrently; any internal
/// state (symbol maps, request counters) is interior-mutable.
pub trait ExchangeAdapter: Send + Sync {
    /// Exchange this adapter speaks for.
    fn exchange_id(&self) -> ExchangeId;

    /// Vendor symbol for a canonical pair ("BTC/USDT" -> "btcusdt").
    fn format_pair(&self, pair: &PairId) -> String;

    /// Wire frame that subscribes this pair's market-data streams.
    fn subscribe_message(&self, pair: &PairId) -> Option<String>;

    /// Wire frame that withdraws this pair's subscriptions.
    fn unsubscribe_message(&self, pair: &PairId) -> Option<String>;

    /// Vendor keepalive payload. None means a protocol-level Ping
    /// frame suffices.
    fn ping_message(&self) -> Option<String> {
        None
    }

    /// Recognize a vendor keepalive reply so it is not routed as data.
    fn is_pong(&self, _raw: &str) -> bool {
        false
    }

    /// Parse one raw text frame into canonical events.
    ///
    /// Acks, heartbeats, and other non-data frames parse to an empty
    /// vec; only genuinely malformed payloads return an error.
    fn parse_message(&self, raw: &str) -> FeedResult<Vec<MarketEvent>>;
}

/// Bridges an [`ExchangeAdapter`] onto the transport's codec seam.
///
/// Transport topics are canonical `BASE/QUOTE` strings; the bridge
/// parses them back into [`PairId`]s for the adapter. A topic that does
/// not parse produces no frame, which keeps bad input off the wire.
pub struct AdapterCodec {
    adapter: Arc<dyn ExchangeAdapter>,
}

impl AdapterCodec {
    pub fn new(adapter: Arc<dyn ExchangeAdapter>) -> Self {
        Self { adapter }
    }
}

impl SubscriptionCodec for AdapterCodec {
    fn subscribe_frame(&self, topic: &str) -> Option<String> {
        let pair = PairId::parse(topic).ok()?;
        self.adapter.subscribe_message(&pair)
    }

    fn unsubscribe_frame(&self, topic: &str) -> Option<String> {
        let pair = PairId::parse(topic).ok()?;
        self.adapter.unsubscribe_message(&pair)
    }

    fn ping_frame(&self) -> Option<String> {
        self.adapter.ping_message()
    }

    fn is_pong_frame(&self, text: &str) -> bool {
        self.adapter.is_pong(text)
    }
}

/// Adapter registry keyed by exchange id.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: DashMap<ExchangeId, Arc<dyn ExchangeAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every bundled adapter.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(crate::adapters::BinanceAdapter::new()));
        registry.register(Arc::new(crate::adapters::CoinbaseAdapter::new()));
        registry
    }

    /// Register an adapter under its own exchange id. A later
    /// registration for the same id replaces the earlier one.
    pub fn register(&self, adapter: Arc<dyn ExchangeAdapter>) {
        self.adapters.insert(adapter.exchange_id(), adapter);
    }

    pub fn get(&self, exchange: &ExchangeId) -> Option<Arc<dyn ExchangeAdapter>> {
        self.adapters.get(exchange).map(|entry| entry.clone())
    }

    pub fn contains(&self, exchange: &ExchangeId) -> bool {
        self.adapters.contains_key(exchange)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Parse a vendor decimal string.
pub(crate) fn parse_decimal(s: &str) -> FeedResult<Decimal> {
    s.parse()
        .map_err(|_| FeedError::ParseError(format!("Invalid decimal: {s}")))
}

/// Parse vendor `[price, quantity]` string tuples into depth levels,
/// preserving the vendor's level order.
pub(crate) fn parse_levels(raw: &[(String, String)]) -> FeedResult<Vec<DepthLevel>> {
    raw.iter()
        .map(|(price, quantity)| {
            Ok(DepthLevel::new(
                parse_decimal(price)?,
                parse_decimal(quantity)?,
            ))
        })
        .collect()
}
