//! Application configuration.
//!
//! One TOML file declares the static market universe (`[[exchanges]]`
//! and `[[pairs]]` tables), the hot-updatable runtime section
//! (`[arbitrage]`), and the tuning sections for the feed and the
//! detector. Every field has a serde default, so a partial file, or no
//! file at all, still loads.

use std::path::Path;

use arb_core::{ArbitrageConfig, Exchange, TradingPair};
use arb_detector::DetectorConfig;
use arb_feed::FeedConfig;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Default configuration file path.
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Runtime knobs shared with the detector and the coordinator.
    /// Hot-updatable through `ArbitrageApp::update_config`.
    #[serde(default)]
    pub arbitrage: ArbitrageConfig,
    /// Analysis scheduling knobs.
    #[serde(default)]
    pub detector: DetectorConfig,
    /// WebSocket reconnect and keepalive tuning.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Exchange declarations registered at startup.
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
    /// Trading-pair declarations registered at startup.
    #[serde(default)]
    pub pairs: Vec<TradingPair>,
}

impl AppConfig {
    /// Resolve the configuration path (CLI override, then `ARB_CONFIG`,
    /// then the default) and load it. A missing file falls back to
    /// defaults with a warning instead of failing startup.
    pub fn load(cli_path: Option<&str>) -> AppResult<Self> {
        let path = cli_path
            .map(str::to_string)
            .or_else(|| std::env::var("ARB_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        if Path::new(&path).exists() {
            info!(path = %path, "Loading configuration");
            Self::from_file(&path)
        } else {
            warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read {path}: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse {path}: {e}")))
    }

    /// Check the runtime sections and the cross-references between the
    /// enabled sets and the declarations.
    pub fn validate(&self) -> AppResult<()> {
        self.arbitrage.validate().map_err(AppError::Config)?;
        self.detector.validate()?;

        for exchange in &self.arbitrage.enabled_exchanges {
            if !self.exchanges.iter().any(|e| e.id == *exchange) {
                return Err(AppError::Config(format!(
                    "enabled exchange {exchange} is not declared in [[exchanges]]"
                )));
            }
        }
        for pair in &self.arbitrage.enabled_pairs {
            if !self.pairs.iter().any(|p| p.id == *pair) {
                return Err(AppError::Config(format!(
                    "enabled pair {pair} is not declared in [[pairs]]"
                )));
            }
        }

        Ok(())
    }
}
