//! Static market registry for the arbitrage engine.
//!
//! Holds the exchange and trading-pair descriptors registered at
//! startup and answers the "which exchanges quote this pair" and "what
//! is this exchange's fee" questions the detector asks on every
//! analysis pass.

pub mod error;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use registry::MarketRegistry;
