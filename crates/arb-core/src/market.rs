//! Market identification and registration types.
//!
//! An arbitrage market is addressed by (exchange, pair): the same trading
//! pair quoted on two different exchanges is two distinct price streams.
//! This module provides the identifiers plus the static exchange/pair
//! descriptors that are registered once at startup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{CoreError, Result};

/// Exchange identifier (e.g., "binance", "coinbase").
///
/// Lower-case short name used as the registry key and in every log line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Canonical trading-pair identifier in `BASE/QUOTE` form (e.g., "BTC/USDT").
///
/// Exchange-native symbols ("btcusdt", "BTC-USD") are produced from this
/// canonical form by the per-exchange adapter, never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairId(String);

impl PairId {
    /// Build from base and quote assets: `PairId::new("BTC", "USDT")` -> "BTC/USDT".
    pub fn new(base: &str, quote: &str) -> Self {
        Self(format!(
            "{}/{}",
            base.to_uppercase(),
            quote.to_uppercase()
        ))
    }

    /// Parse a `BASE/QUOTE` symbol, validating the shape.
    pub fn parse(symbol: &str) -> Result<Self> {
        match symbol.split_once('/') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
                Ok(Self::new(base, quote))
            }
            _ => Err(CoreError::InvalidPair(symbol.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base asset (left of the slash).
    pub fn base(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// Quote asset (right of the slash).
    pub fn quote(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or("")
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique key for one price stream: a pair quoted on one exchange.
///
/// Format: `{exchange}:{pair}` (e.g., "binance:BTC/USDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub exchange: ExchangeId,
    pub pair: PairId,
}

impl MarketKey {
    pub fn new(exchange: ExchangeId, pair: PairId) -> Self {
        Self { exchange, pair }
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.pair)
    }
}

/// Static exchange descriptor.
///
/// Registered once at startup and immutable afterwards. Fee and endpoint
/// changes require a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Registry key.
    pub id: ExchangeId,
    /// Human-readable name (e.g., "Binance").
    pub name: String,
    /// WebSocket market-data endpoint.
    pub ws_url: String,
    /// REST endpoint (reserved for collaborators that submit real orders).
    pub rest_url: String,
    /// Taker fee as a fraction (0.001 = 0.1%).
    pub fee_rate: Decimal,
    /// Withdrawal fee per asset, in units of that asset.
    #[serde(default)]
    pub withdrawal_fees: HashMap<String, Decimal>,
    /// Assets this exchange lists.
    #[serde(default)]
    pub supported_assets: Vec<String>,
}

impl Exchange {
    /// Check whether the exchange lists every asset of the given pair.
    pub fn supports_assets(&self, pair: &PairId) -> bool {
        if self.supported_assets.is_empty() {
            return true;
        }
        self.supported_assets.iter().any(|a| a == pair.base())
            && self.supported_assets.iter().any(|a| a == pair.quote())
    }
}

/// Static trading-pair descriptor.
///
/// Registered once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPair {
    /// Canonical pair id.
    pub id: PairId,
    /// Base asset (e.g., "BTC").
    pub base_asset: String,
    /// Quote asset (e.g., "USDT").
    pub quote_asset: String,
    /// Minimum order size in base units.
    pub min_order_size: Decimal,
    /// Maximum order size in base units.
    pub max_order_size: Decimal,
    /// Decimal places for prices.
    pub price_decimals: u8,
    /// Decimal places for quantities.
    pub quantity_decimals: u8,
    /// Exchanges that quote this pair.
    pub exchange_ids: Vec<ExchangeId>,
}

impl TradingPair {
    /// Check whether an exchange quotes this pair.
    pub fn is_on_exchange(&self, exchange: &ExchangeId) -> bool {
        self.exchange_ids.contains(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pair_id_parse() {
        let pair = PairId::parse("btc/usdt").unwrap();
        assert_eq!(pair.as_str(), "BTC/USDT");
        assert_eq!(pair.base(), "BTC");
        assert_eq!(pair.quote(), "USDT");
    }

    #[test]
    fn test_pair_id_parse_rejects_malformed() {
        assert!(PairId::parse("BTCUSDT").is_err());
        assert!(PairId::parse("/USDT").is_err());
        assert!(PairId::parse("BTC/").is_err());
    }

    #[test]
    fn test_market_key_display() {
        let key = MarketKey::new(ExchangeId::new("binance"), PairId::new("BTC", "USDT"));
        assert_eq!(key.to_string(), "binance:BTC/USDT");
    }

    #[test]
    fn test_exchange_id_normalized() {
        assert_eq!(ExchangeId::new("Binance"), ExchangeId::new("binance"));
    }

    #[test]
    fn test_exchange_supports_assets() {
        let exchange = Exchange {
            id: ExchangeId::new("binance"),
            name: "Binance".to_string(),
            ws_url: "wss://stream.binance.com:9443/stream".to_string(),
            rest_url: "https://api.binance.com".to_string(),
            fee_rate: dec!(0.001),
            withdrawal_fees: HashMap::new(),
            supported_assets: vec!["BTC".to_string(), "USDT".to_string()],
        };

        assert!(exchange.supports_assets(&PairId::new("BTC", "USDT")));
        assert!(!exchange.supports_assets(&PairId::new("ETH", "USDT")));
    }

    #[test]
    fn test_pair_on_exchange() {
        let pair = TradingPair {
            id: PairId::new("BTC", "USDT"),
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            min_order_size: dec!(0.0001),
            max_order_size: dec!(100),
            price_decimals: 2,
            quantity_decimals: 6,
            exchange_ids: vec![ExchangeId::new("binance")],
        };

        assert!(pair.is_on_exchange(&ExchangeId::new("binance")));
        assert!(!pair.is_on_exchange(&ExchangeId::new("coinbase")));
    }
}
