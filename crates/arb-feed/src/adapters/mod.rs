//! Bundled exchange adapters.

pub mod binance;
pub mod coinbase;

pub use binance::BinanceAdapter;
pub use coinbase::CoinbaseAdapter;
