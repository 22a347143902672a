//! Shared price cache.
//!
//! One [`PriceSnapshot`] per (exchange, pair), overwritten in place by
//! canonical events. Entries are individually guarded so exchanges
//! write concurrently without contending with each other.

use arb_core::{BookUpdate, MarketKey, PriceSnapshot, TickerUpdate};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::event::MarketEvent;

type Entry = Arc<RwLock<PriceSnapshot>>;

/// Latest-price cache across all exchanges.
#[derive(Default)]
pub struct PriceBook {
    entries: DashMap<MarketKey, Entry>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one canonical event into the cache.
    pub fn apply(&self, event: &MarketEvent) {
        match event {
            MarketEvent::Ticker { key, update } => self.apply_ticker(key, update),
            MarketEvent::Book { key, update } => self.apply_book(key, update),
        }
    }

    pub fn apply_ticker(&self, key: &MarketKey, update: &TickerUpdate) {
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(PriceSnapshot::from_ticker(key.clone(), update))))
            .clone();
        entry.write().apply_ticker(update);
    }

    pub fn apply_book(&self, key: &MarketKey, update: &BookUpdate) {
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RwLock::new(PriceSnapshot::from_book(key.clone(), update))))
            .clone();
        entry.write().apply_book(update);
    }

    /// Current snapshot for a market, if any update has arrived.
    pub fn get(&self, key: &MarketKey) -> Option<PriceSnapshot> {
        self.entries.get(key).map(|entry| entry.read().clone())
    }

    /// All market keys with at least one update.
    pub fn keys(&self) -> Vec<MarketKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
