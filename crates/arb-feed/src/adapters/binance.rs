//! Binance adapter.
//!
//! Speaks the combined-stream endpoint (`/stream`): every data frame
//! arrives wrapped in `{"stream": "<symbol>@<channel>", "data": {...}}`.
//! Per pair we subscribe two streams: `bookTicker` for best bid/ask and
//! `depth20@100ms` for partial-book snapshots.
//!
//! Binance symbols ("btcusdt") cannot be split back into base/quote
//! mechanically, so the adapter records symbol -> pair when it formats
//! a pair and uses that map to attribute inbound frames.

use arb_core::{BookUpdate, ExchangeId, MarketKey, OrderBookDepth, PairId, TickerUpdate};
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::adapter::{parse_decimal, parse_levels, ExchangeAdapter};
use crate::error::{FeedError, FeedResult};
use crate::event::MarketEvent;

/// Best bid/ask payload from the `bookTicker` stream.
#[derive(Debug, Deserialize)]
struct RawBookTicker {
    #[serde(rename = "b")]
    bid: String,
    #[serde(rename = "a")]
    ask: String,
}

/// Partial-book payload from the `depth<N>` stream.
#[derive(Debug, Deserialize)]
struct RawPartialDepth {
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

pub struct BinanceAdapter {
    id: ExchangeId,
    /// JSON-RPC request id for SUBSCRIBE/UNSUBSCRIBE frames.
    request_id: AtomicU64,
    /// Vendor symbol -> canonical pair, filled as pairs are formatted.
    symbols: DashMap<String, PairId>,
}

impl BinanceAdapter {
    pub fn new() -> Self {
        Self {
            id: ExchangeId::new("binance"),
            request_id: AtomicU64::new(1),
            symbols: DashMap::new(),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The two streams subscribed per pair.
    fn streams(&self, pair: &PairId) -> [String; 2] {
        let symbol = self.format_pair(pair);
        [
            format!("{symbol}@bookTicker"),
            format!("{symbol}@depth20@100ms"),
        ]
    }

    fn pair_for_symbol(&self, symbol: &str) -> FeedResult<PairId> {
        self.symbols
            .get(symbol)
            .map(|entry| entry.clone())
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))
    }
}

impl Default for BinanceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeAdapter for BinanceAdapter {
    fn exchange_id(&self) -> ExchangeId {
        self.id.clone()
    }

    fn format_pair(&self, pair: &PairId) -> String {
        let symbol = format!(
            "{}{}",
            pair.base().to_lowercase(),
            pair.quote().to_lowercase()
        );
        self.symbols.insert(symbol.clone(), pair.clone());
        symbol
    }

    fn subscribe_message(&self, pair: &PairId) -> Option<String> {
        let [ticker, depth] = self.streams(pair);
        Some(
            json!({
                "method": "SUBSCRIBE",
                "params": [ticker, depth],
                "id": self.next_request_id(),
            })
            .to_string(),
        )
    }

    fn unsubscribe_message(&self, pair: &PairId) -> Option<String> {
        let [ticker, depth] = self.streams(pair);
        Some(
            json!({
                "method": "UNSUBSCRIBE",
                "params": [ticker, depth],
                "id": self.next_request_id(),
            })
            .to_string(),
        )
    }

    fn parse_message(&self, raw: &str) -> FeedResult<Vec<MarketEvent>> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        // Command acks look like {"result": null, "id": 3}.
        if value.get("id").is_some() {
            return Ok(Vec::new());
        }

        let Some(stream) = value.get("stream").and_then(|s| s.as_str()) else {
            return Ok(Vec::new());
        };
        let Some((symbol, channel)) = stream.split_once('@') else {
            return Ok(Vec::new());
        };

        let pair = self.pair_for_symbol(symbol)?;
        let key = MarketKey::new(self.id.clone(), pair);
        let data = value
            .get("data")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        if channel == "bookTicker" {
            let raw: RawBookTicker = serde_json::from_value(data)?;
            let update = TickerUpdate {
                bid: parse_decimal(&raw.bid)?,
                ask: parse_decimal(&raw.ask)?,
                // bookTicker carries no volume; the snapshot keeps any
                // earlier value.
                volume_24h: None,
                timestamp: Utc::now(),
            };
            return Ok(vec![MarketEvent::Ticker { key, update }]);
        }

        if channel.starts_with("depth") {
            let raw: RawPartialDepth = serde_json::from_value(data)?;
            // Binance partial depth delivers bids descending and asks
            // ascending, matching the canonical order.
            let depth = OrderBookDepth::new(parse_levels(&raw.bids)?, parse_levels(&raw.asks)?);
            let update = BookUpdate {
                depth,
                timestamp: Utc::now(),
            };
            return Ok(vec![MarketEvent::Book { key, update }]);
        }

        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn adapter_with_btc() -> BinanceAdapter {
        let adapter = BinanceAdapter::new();
        // Subscribing registers the symbol mapping.
        adapter.subscribe_message(&PairId::new("BTC", "USDT"));
        adapter
    }

    #[test]
    fn test_format_pair() {
        let adapter = BinanceAdapter::new();
        assert_eq!(adapter.format_pair(&PairId::new("BTC", "USDT")), "btcusdt");
        assert_eq!(adapter.format_pair(&PairId::new("ETH", "BTC")), "ethbtc");
    }

    #[test]
    fn test_subscribe_message_covers_both_streams() {
        let adapter = BinanceAdapter::new();
        let frame = adapter
            .subscribe_message(&PairId::new("BTC", "USDT"))
            .unwrap();
        assert!(frame.contains("\"SUBSCRIBE\""));
        assert!(frame.contains("btcusdt@bookTicker"));
        assert!(frame.contains("btcusdt@depth20@100ms"));
    }

    #[test]
    fn test_request_ids_increment() {
        let adapter = BinanceAdapter::new();
        let first = adapter
            .subscribe_message(&PairId::new("BTC", "USDT"))
            .unwrap();
        let second = adapter
            .unsubscribe_message(&PairId::new("BTC", "USDT"))
            .unwrap();
        assert!(first.contains("\"id\":1"));
        assert!(second.contains("\"id\":2"));
    }

    #[test]
    fn test_parse_book_ticker() {
        let adapter = adapter_with_btc();
        let raw = r#"{"stream":"btcusdt@bookTicker","data":{"u":400900217,"s":"BTCUSDT","b":"50000.10","B":"31.21","a":"50001.30","A":"40.66"}}"#;

        let events = adapter.parse_message(raw).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            MarketEvent::Ticker { key, update } => {
                assert_eq!(key.to_string(), "binance:BTC/USDT");
                assert_eq!(update.bid, dec!(50000.10));
                assert_eq!(update.ask, dec!(50001.30));
                assert!(update.volume_24h.is_none());
            }
            other => panic!("expected ticker, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_partial_depth() {
        let adapter = adapter_with_btc();
        let raw = r#"{"stream":"btcusdt@depth20@100ms","data":{"lastUpdateId":160,"bids":[["50000.00","1.5"],["49999.00","2.0"]],"asks":[["50001.00","1.0"],["50002.00","3.0"]]}}"#;

        let events = adapter.parse_message(raw).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            MarketEvent::Book { key, update } => {
                assert_eq!(key.pair, PairId::new("BTC", "USDT"));
                assert_eq!(update.depth.bids.len(), 2);
                assert_eq!(update.depth.best_bid().unwrap().price, dec!(50000.00));
                assert_eq!(update.depth.best_ask().unwrap().price, dec!(50001.00));
            }
            other => panic!("expected book, got {other:?}"),
        }
    }

    #[test]
    fn test_ack_frame_parses_to_nothing() {
        let adapter = adapter_with_btc();
        let events = adapter.parse_message(r#"{"result":null,"id":1}"#).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_symbol_is_an_error() {
        let adapter = BinanceAdapter::new();
        let raw = r#"{"stream":"dogeusdt@bookTicker","data":{"b":"0.1","a":"0.2"}}"#;
        assert!(matches!(
            adapter.parse_message(raw),
            Err(FeedError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let adapter = adapter_with_btc();
        assert!(adapter.parse_message("not json").is_err());
    }
}
