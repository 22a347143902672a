//! Exchange and trading-pair registry.
//!
//! Descriptors are registered once during startup and are immutable
//! afterwards. Re-registering the same id is an error; fee or endpoint
//! changes require a restart.

use arb_core::{Exchange, ExchangeId, PairId, TradingPair};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

/// Registry of every exchange and pair the engine knows about.
///
/// Pairs must be registered after the exchanges they reference.
#[derive(Default)]
pub struct MarketRegistry {
    exchanges: DashMap<ExchangeId, Arc<Exchange>>,
    pairs: DashMap<PairId, Arc<TradingPair>>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_exchange(&self, exchange: Exchange) -> RegistryResult<()> {
        if self.exchanges.contains_key(&exchange.id) {
            return Err(RegistryError::ExchangeAlreadyRegistered(
                exchange.id.to_string(),
            ));
        }
        debug!(exchange = %exchange.id, fee_rate = %exchange.fee_rate, "registered exchange");
        self.exchanges.insert(exchange.id.clone(), Arc::new(exchange));
        Ok(())
    }

    /// Register a pair, checking that every referenced exchange exists.
    pub fn register_pair(&self, pair: TradingPair) -> RegistryResult<()> {
        if self.pairs.contains_key(&pair.id) {
            return Err(RegistryError::PairAlreadyRegistered(pair.id.to_string()));
        }
        if pair.exchange_ids.is_empty() {
            return Err(RegistryError::NoExchangesForPair(pair.id.to_string()));
        }
        for exchange in &pair.exchange_ids {
            if !self.exchanges.contains_key(exchange) {
                return Err(RegistryError::UnknownExchange {
                    pair: pair.id.to_string(),
                    exchange: exchange.to_string(),
                });
            }
        }
        debug!(pair = %pair.id, exchanges = pair.exchange_ids.len(), "registered pair");
        self.pairs.insert(pair.id.clone(), Arc::new(pair));
        Ok(())
    }

    pub fn exchange(&self, id: &ExchangeId) -> Option<Arc<Exchange>> {
        self.exchanges.get(id).map(|entry| entry.clone())
    }

    pub fn pair(&self, id: &PairId) -> Option<Arc<TradingPair>> {
        self.pairs.get(id).map(|entry| entry.clone())
    }

    pub fn contains_exchange(&self, id: &ExchangeId) -> bool {
        self.exchanges.contains_key(id)
    }

    pub fn contains_pair(&self, id: &PairId) -> bool {
        self.pairs.contains_key(id)
    }

    /// All registered exchanges, unordered.
    pub fn exchanges(&self) -> Vec<Arc<Exchange>> {
        self.exchanges.iter().map(|entry| entry.clone()).collect()
    }

    /// All registered pairs, unordered.
    pub fn pairs(&self) -> Vec<Arc<TradingPair>> {
        self.pairs.iter().map(|entry| entry.clone()).collect()
    }

    /// Registered exchanges that quote the given pair.
    pub fn exchanges_for_pair(&self, pair: &PairId) -> Vec<Arc<Exchange>> {
        let Some(pair) = self.pair(pair) else {
            return Vec::new();
        };
        pair.exchange_ids
            .iter()
            .filter_map(|id| self.exchange(id))
            .collect()
    }

    /// Taker fee rate for one exchange, as a fraction.
    pub fn fee_rate(&self, id: &ExchangeId) -> Option<Decimal> {
        self.exchange(id).map(|exchange| exchange.fee_rate)
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn sample_pair(exchanges: &[&str]) -> TradingPair {
        TradingPair {
            id: PairId::new("BTC", "USDT"),
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            min_order_size: dec!(0.0001),
            max_order_size: dec!(100),
            price_decimals: 2,
            quantity_decimals: 6,
            exchange_ids: exchanges.iter().map(|e| ExchangeId::new(*e)).collect(),
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = MarketRegistry::new();
        registry.register_exchange(sample_exchange("binance")).unwrap();
        registry.register_exchange(sample_exchange("coinbase")).unwrap();
        registry.register_pair(sample_pair(&["binance", "coinbase"])).unwrap();

        assert_eq!(registry.exchange_count(), 2);
        assert_eq!(registry.pair_count(), 1);
        assert!(registry.contains_exchange(&ExchangeId::new("binance")));
        assert_eq!(
            registry.fee_rate(&ExchangeId::new("binance")),
            Some(dec!(0.001))
        );

        let supporting = registry.exchanges_for_pair(&PairId::new("BTC", "USDT"));
        assert_eq!(supporting.len(), 2);
    }

    #[test]
    fn test_duplicate_exchange_rejected() {
        let registry = MarketRegistry::new();
        registry.register_exchange(sample_exchange("binance")).unwrap();

        let result = registry.register_exchange(sample_exchange("binance"));
        assert!(matches!(
            result,
            Err(RegistryError::ExchangeAlreadyRegistered(_))
        ));
        assert_eq!(registry.exchange_count(), 1);
    }

    #[test]
    fn test_pair_requires_known_exchanges() {
        let registry = MarketRegistry::new();
        registry.register_exchange(sample_exchange("binance")).unwrap();

        let result = registry.register_pair(sample_pair(&["binance", "kraken"]));
        assert!(matches!(result, Err(RegistryError::UnknownExchange { .. })));
        assert_eq!(registry.pair_count(), 0);
    }

    #[test]
    fn test_pair_requires_some_exchange() {
        let registry = MarketRegistry::new();
        let result = registry.register_pair(sample_pair(&[]));
        assert!(matches!(result, Err(RegistryError::NoExchangesForPair(_))));
    }

    #[test]
    fn test_exchanges_for_unknown_pair_is_empty() {
        let registry = MarketRegistry::new();
        assert!(registry
            .exchanges_for_pair(&PairId::new("ETH", "USDT"))
            .is_empty());
    }
}
