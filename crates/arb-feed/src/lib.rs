//! Market-data feeds for the arbitrage engine.
//!
//! Normalizes vendor WebSocket streams into canonical ticker and
//! order-book events, maintains the shared [`PriceBook`], and manages
//! per-exchange connection lifecycles. Vendor specifics live behind
//! the [`ExchangeAdapter`] trait; Binance and Coinbase adapters are
//! bundled.

pub mod adapter;
pub mod adapters;
pub mod book;
pub mod error;
pub mod event;
pub mod normalizer;

pub use adapter::{AdapterCodec, AdapterRegistry, ExchangeAdapter};
pub use adapters::{BinanceAdapter, CoinbaseAdapter};
pub use book::PriceBook;
pub use error::{FeedError, FeedResult};
pub use event::MarketEvent;
pub use normalizer::{FeedConfig, FeedNormalizer};
