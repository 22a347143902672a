//! Cross-exchange opportunity detection.
//!
//! Watches the shared [`PriceBook`](arb_feed::PriceBook) through
//! normalized market events and schedules debounced, rate-limited
//! analyses per trading pair. Profitable exchange pairings become
//! [`Opportunity`](arb_core::Opportunity) records on the store and the
//! event bus, optionally handed straight to the executor.

pub mod config;
pub mod debounce;
pub mod detector;
pub mod error;

pub use config::DetectorConfig;
pub use debounce::DelayedTask;
pub use detector::OpportunityDetector;
pub use error::{DetectorError, DetectorResult};
