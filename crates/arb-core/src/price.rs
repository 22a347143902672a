//! Canonical price data shared by all exchanges.
//!
//! Vendor feeds are normalized into [`TickerUpdate`] and [`BookUpdate`]
//! events which fold into one [`PriceSnapshot`] per market key. The
//! snapshot is overwritten in place on every event, never historized.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::MarketKey;

/// One price level of an order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl DepthLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// Order-book depth snapshot.
///
/// Invariant: `bids` are sorted by price descending, `asks` ascending.
/// Adapters deliver levels in this order; the walks below rely on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookDepth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl OrderBookDepth {
    pub fn new(bids: Vec<DepthLevel>, asks: Vec<DepthLevel>) -> Self {
        Self { bids, asks }
    }

    /// Highest bid, if any.
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    /// Lowest ask, if any.
    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Total ask-side quantity priced at or below `price_limit`.
    ///
    /// Walks from the best ask and stops at the first level above the
    /// limit; levels beyond that are not counted even if cheaper levels
    /// were to reappear deeper in a malformed book.
    pub fn ask_liquidity_within(&self, price_limit: Decimal) -> Decimal {
        self.asks
            .iter()
            .take_while(|level| level.price <= price_limit)
            .map(|level| level.quantity)
            .sum()
    }

    /// Total bid-side quantity priced at or above `price_floor`.
    ///
    /// Walks from the best bid and stops at the first level below the
    /// floor.
    pub fn bid_liquidity_within(&self, price_floor: Decimal) -> Decimal {
        self.bids
            .iter()
            .take_while(|level| level.price >= price_floor)
            .map(|level| level.quantity)
            .sum()
    }
}

/// Canonical best bid/ask update from one exchange feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerUpdate {
    /// Best bid price.
    pub bid: Decimal,
    /// Best ask price.
    pub ask: Decimal,
    /// Rolling 24h volume in base units, when the vendor reports it.
    pub volume_24h: Option<Decimal>,
    /// Exchange or receive timestamp.
    pub timestamp: DateTime<Utc>,
}

impl TickerUpdate {
    pub fn new(bid: Decimal, ask: Decimal, volume_24h: Option<Decimal>) -> Self {
        Self {
            bid,
            ask,
            volume_24h,
            timestamp: Utc::now(),
        }
    }
}

/// Canonical order-book update from one exchange feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookUpdate {
    pub depth: OrderBookDepth,
    pub timestamp: DateTime<Utc>,
}

impl BookUpdate {
    pub fn new(depth: OrderBookDepth) -> Self {
        Self {
            depth,
            timestamp: Utc::now(),
        }
    }
}

/// Latest known prices for one market key.
///
/// Ticker updates overwrite bid/ask directly. Book updates replace the
/// depth and derive bid/ask from the top level; an empty side zeroes the
/// derived price, which excludes the snapshot from analysis until a
/// valid quote arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub key: MarketKey,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume_24h: Option<Decimal>,
    pub depth: Option<OrderBookDepth>,
    pub updated_at: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn from_ticker(key: MarketKey, ticker: &TickerUpdate) -> Self {
        Self {
            key,
            bid: ticker.bid,
            ask: ticker.ask,
            volume_24h: ticker.volume_24h,
            depth: None,
            updated_at: ticker.timestamp,
        }
    }

    pub fn from_book(key: MarketKey, book: &BookUpdate) -> Self {
        let mut snapshot = Self {
            key,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            volume_24h: None,
            depth: None,
            updated_at: book.timestamp,
        };
        snapshot.apply_book(book);
        snapshot
    }

    /// Fold a ticker update in. Depth from earlier book updates is kept.
    pub fn apply_ticker(&mut self, ticker: &TickerUpdate) {
        self.bid = ticker.bid;
        self.ask = ticker.ask;
        if ticker.volume_24h.is_some() {
            self.volume_24h = ticker.volume_24h;
        }
        self.updated_at = ticker.timestamp;
    }

    /// Fold a book update in, replacing depth and deriving bid/ask from
    /// the top level.
    pub fn apply_book(&mut self, book: &BookUpdate) {
        self.bid = book
            .depth
            .best_bid()
            .map(|level| level.price)
            .unwrap_or(Decimal::ZERO);
        self.ask = book
            .depth
            .best_ask()
            .map(|level| level.price)
            .unwrap_or(Decimal::ZERO);
        self.depth = Some(book.depth.clone());
        self.updated_at = book.timestamp;
    }

    /// Usable for analysis: both sides quoted and positive.
    pub fn is_valid(&self) -> bool {
        self.bid > Decimal::ZERO && self.ask > Decimal::ZERO
    }

    /// Age of this snapshot in milliseconds.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.updated_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{ExchangeId, PairId};
    use rust_decimal_macros::dec;

    fn sample_key() -> MarketKey {
        MarketKey::new(ExchangeId::new("binance"), PairId::new("BTC", "USDT"))
    }

    fn sample_depth() -> OrderBookDepth {
        OrderBookDepth::new(
            vec![
                DepthLevel::new(dec!(100.0), dec!(2)),
                DepthLevel::new(dec!(99.5), dec!(3)),
                DepthLevel::new(dec!(99.0), dec!(5)),
            ],
            vec![
                DepthLevel::new(dec!(100.5), dec!(1)),
                DepthLevel::new(dec!(101.0), dec!(4)),
                DepthLevel::new(dec!(102.0), dec!(10)),
            ],
        )
    }

    #[test]
    fn test_ask_liquidity_walk() {
        let depth = sample_depth();
        // Limit 101.0 covers the first two ask levels only.
        assert_eq!(depth.ask_liquidity_within(dec!(101.0)), dec!(5));
        // Limit below best ask covers nothing.
        assert_eq!(depth.ask_liquidity_within(dec!(100.0)), dec!(0));
    }

    #[test]
    fn test_bid_liquidity_walk() {
        let depth = sample_depth();
        // Floor 99.5 covers the first two bid levels only.
        assert_eq!(depth.bid_liquidity_within(dec!(99.5)), dec!(5));
        assert_eq!(depth.bid_liquidity_within(dec!(100.5)), dec!(0));
    }

    #[test]
    fn test_liquidity_walk_stops_at_first_outside_level() {
        // A level inside the limit hiding behind one outside it must not
        // be counted.
        let depth = OrderBookDepth::new(
            vec![],
            vec![
                DepthLevel::new(dec!(100.0), dec!(1)),
                DepthLevel::new(dec!(105.0), dec!(1)),
                DepthLevel::new(dec!(100.1), dec!(50)),
            ],
        );
        assert_eq!(depth.ask_liquidity_within(dec!(101.0)), dec!(1));
    }

    #[test]
    fn test_snapshot_ticker_keeps_depth() {
        let mut snapshot = PriceSnapshot::from_book(sample_key(), &BookUpdate::new(sample_depth()));
        assert_eq!(snapshot.bid, dec!(100.0));
        assert_eq!(snapshot.ask, dec!(100.5));
        assert!(snapshot.depth.is_some());

        snapshot.apply_ticker(&TickerUpdate::new(dec!(100.1), dec!(100.6), Some(dec!(500))));
        assert_eq!(snapshot.bid, dec!(100.1));
        assert_eq!(snapshot.ask, dec!(100.6));
        assert_eq!(snapshot.volume_24h, Some(dec!(500)));
        assert!(snapshot.depth.is_some());
    }

    #[test]
    fn test_snapshot_invalid_on_empty_book_side() {
        let book = BookUpdate::new(OrderBookDepth::new(
            vec![],
            vec![DepthLevel::new(dec!(100.5), dec!(1))],
        ));
        let snapshot = PriceSnapshot::from_book(sample_key(), &book);
        assert_eq!(snapshot.bid, dec!(0));
        assert!(!snapshot.is_valid());
    }

    #[test]
    fn test_ticker_without_volume_keeps_previous() {
        let mut snapshot = PriceSnapshot::from_ticker(
            sample_key(),
            &TickerUpdate::new(dec!(100), dec!(101), Some(dec!(250))),
        );
        snapshot.apply_ticker(&TickerUpdate::new(dec!(100.2), dec!(101.2), None));
        assert_eq!(snapshot.volume_24h, Some(dec!(250)));
    }
}
