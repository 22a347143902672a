//! Core domain types for the cross-exchange arbitrage engine.
//!
//! This crate contains the shared vocabulary of the system:
//! - Market identity ([`ExchangeId`], [`PairId`], [`MarketKey`]) and the
//!   static exchange/pair descriptors registered at startup
//! - Canonical price data ([`PriceSnapshot`], [`OrderBookDepth`]) that
//!   every vendor feed is normalized into
//! - The opportunity lifecycle ([`Opportunity`], [`OpportunityStatus`])
//! - Shared runtime configuration and the typed event bus

pub mod config;
pub mod error;
pub mod events;
pub mod market;
pub mod opportunity;
pub mod price;
pub mod store;

pub use config::{ArbitrageConfig, NotificationThresholds, RiskLevel, SharedConfig};
pub use error::{CoreError, Result};
pub use events::{ArbEvent, EventBus};
pub use market::{Exchange, ExchangeId, MarketKey, PairId, TradingPair};
pub use opportunity::{
    direction_profit, DirectionProfit, ExecutionDetails, FeeBreakdown, Opportunity,
    OpportunityStatus,
};
pub use price::{BookUpdate, DepthLevel, OrderBookDepth, PriceSnapshot, TickerUpdate};
pub use store::{OpportunityStore, SharedOpportunity};
