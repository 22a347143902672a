//! Cross-exchange arbitrage bot.
//!
//! Application shell that wires the engine together:
//! - market registry built from the TOML declarations
//! - WebSocket feeds normalized into the shared price book
//! - opportunity detection with debounced per-pair analysis
//! - admission-controlled execution with simulated trade legs

pub mod app;
pub mod config;
pub mod error;

pub use app::ArbitrageApp;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
