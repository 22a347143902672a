//! Canonical market-data events.
//!
//! Every vendor payload is parsed into one of these before it touches
//! the price book or the detector. Downstream code never sees vendor
//! field names.

use arb_core::{BookUpdate, MarketKey, PairId, TickerUpdate};

/// Normalized market-data event for one (exchange, pair) stream.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// Best bid/ask update.
    Ticker {
        key: MarketKey,
        update: TickerUpdate,
    },
    /// Order-book depth replacement.
    Book { key: MarketKey, update: BookUpdate },
}

impl MarketEvent {
    pub fn key(&self) -> &MarketKey {
        match self {
            Self::Ticker { key, .. } => key,
            Self::Book { key, .. } => key,
        }
    }

    pub fn pair(&self) -> &PairId {
        &self.key().pair
    }
}
