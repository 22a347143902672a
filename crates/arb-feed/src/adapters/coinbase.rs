//! Coinbase Exchange adapter.
//!
//! Subscribes the `ticker` and `level2` channels per pair on the
//! ws-feed endpoint. Frames are tagged by a top-level `"type"` field.
//! Product ids ("BTC-USD") map to canonical pairs mechanically, so no
//! symbol table is needed.

use arb_core::{BookUpdate, ExchangeId, MarketKey, OrderBookDepth, PairId, TickerUpdate};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::adapter::{parse_decimal, parse_levels, ExchangeAdapter};
use crate::error::{FeedError, FeedResult};
use crate::event::MarketEvent;

/// Depth levels kept from a level2 snapshot. Coinbase sends the full
/// book; the liquidity walks never need more than the top.
const MAX_DEPTH_LEVELS: usize = 20;

#[derive(Debug, Deserialize)]
struct RawTicker {
    product_id: String,
    best_bid: String,
    best_ask: String,
    #[serde(default)]
    volume_24h: Option<String>,
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    product_id: String,
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

pub struct CoinbaseAdapter {
    id: ExchangeId,
}

impl CoinbaseAdapter {
    pub fn new() -> Self {
        Self {
            id: ExchangeId::new("coinbase"),
        }
    }

    fn pair_for_product(&self, product_id: &str) -> FeedResult<PairId> {
        match product_id.split_once('-') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
                Ok(PairId::new(base, quote))
            }
            _ => Err(FeedError::UnknownSymbol(product_id.to_string())),
        }
    }

    fn parse_ticker(&self, data: serde_json::Value) -> FeedResult<MarketEvent> {
        let raw: RawTicker = serde_json::from_value(data)?;
        let key = MarketKey::new(self.id.clone(), self.pair_for_product(&raw.product_id)?);

        let volume_24h = match &raw.volume_24h {
            Some(v) => Some(parse_decimal(v)?),
            None => None,
        };
        let timestamp = raw
            .time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(MarketEvent::Ticker {
            key,
            update: TickerUpdate {
                bid: parse_decimal(&raw.best_bid)?,
                ask: parse_decimal(&raw.best_ask)?,
                volume_24h,
                timestamp,
            },
        })
    }

    fn parse_snapshot(&self, data: serde_json::Value) -> FeedResult<MarketEvent> {
        let raw: RawSnapshot = serde_json::from_value(data)?;
        let key = MarketKey::new(self.id.clone(), self.pair_for_product(&raw.product_id)?);

        // The snapshot arrives best-first on both sides; keep the top.
        let bids = parse_levels(&raw.bids[..raw.bids.len().min(MAX_DEPTH_LEVELS)])?;
        let asks = parse_levels(&raw.asks[..raw.asks.len().min(MAX_DEPTH_LEVELS)])?;

        Ok(MarketEvent::Book {
            key,
            update: BookUpdate {
                depth: OrderBookDepth::new(bids, asks),
                timestamp: Utc::now(),
            },
        })
    }
}

impl Default for CoinbaseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeAdapter for CoinbaseAdapter {
    fn exchange_id(&self) -> ExchangeId {
        self.id.clone()
    }

    fn format_pair(&self, pair: &PairId) -> String {
        format!("{}-{}", pair.base(), pair.quote())
    }

    fn subscribe_message(&self, pair: &PairId) -> Option<String> {
        Some(
            json!({
                "type": "subscribe",
                "product_ids": [self.format_pair(pair)],
                "channels": ["ticker", "level2"],
            })
            .to_string(),
        )
    }

    fn unsubscribe_message(&self, pair: &PairId) -> Option<String> {
        Some(
            json!({
                "type": "unsubscribe",
                "product_ids": [self.format_pair(pair)],
                "channels": ["ticker", "level2"],
            })
            .to_string(),
        )
    }

    fn parse_message(&self, raw: &str) -> FeedResult<Vec<MarketEvent>> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let frame_type = value.get("type").and_then(|t| t.as_str()).unwrap_or("");

        match frame_type {
            "ticker" => Ok(vec![self.parse_ticker(value)?]),
            "snapshot" => Ok(vec![self.parse_snapshot(value)?]),
            "l2update" => {
                // Incremental book maintenance is out of scope; the
                // ticker channel keeps best bid/ask fresh between
                // snapshots.
                debug!("ignoring l2update frame");
                Ok(Vec::new())
            }
            "error" => {
                let raw_error: RawError = serde_json::from_value(value)?;
                let detail = match raw_error.reason {
                    Some(reason) => format!("{}: {}", raw_error.message, reason),
                    None => raw_error.message,
                };
                Err(FeedError::Vendor(detail))
            }
            // subscriptions acks, heartbeats, unknown frames
            _ => Ok(Vec::new()),
        }
    }
}
