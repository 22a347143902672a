//! Runtime arbitrage configuration.
//!
//! One [`ArbitrageConfig`] instance is shared behind a lock by the
//! detector, the coordinator, and the application shell. All fields are
//! hot-updatable; changing the enabled pairs or exchanges additionally
//! requires a feed restart, which [`ArbitrageConfig::requires_restart`]
//! detects.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::market::{ExchangeId, PairId};

/// Shared handle to the live configuration.
pub type SharedConfig = Arc<RwLock<ArbitrageConfig>>;

/// Operator risk appetite. Logged with every execution decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Thresholds above which detections and completions get flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationThresholds {
    /// Profit percentage at which a detection is also emitted as a
    /// high-profit event.
    #[serde(default = "default_notify_profit_pct")]
    pub profit_pct: Decimal,
    /// Execution wall time above which a completion is logged loudly.
    #[serde(default = "default_notify_execution_time_ms")]
    pub execution_time_ms: u64,
}

fn default_notify_profit_pct() -> Decimal {
    Decimal::ONE // 1%
}

fn default_notify_execution_time_ms() -> u64 {
    10_000
}

impl Default for NotificationThresholds {
    fn default() -> Self {
        Self {
            profit_pct: default_notify_profit_pct(),
            execution_time_ms: default_notify_execution_time_ms(),
        }
    }
}

/// Arbitrage engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageConfig {
    /// Minimum net profit percentage for auto-execution.
    #[serde(default = "default_min_profit_pct")]
    pub min_profit_pct: Decimal,
    /// Upper bound on the leg-execution phase, in milliseconds.
    #[serde(default = "default_max_execution_time_ms")]
    pub max_execution_time_ms: u64,
    /// Pairs the detector analyzes.
    #[serde(default)]
    pub enabled_pairs: Vec<PairId>,
    /// Exchanges the feed connects to.
    #[serde(default)]
    pub enabled_exchanges: Vec<ExchangeId>,
    /// Execute qualifying opportunities without operator action.
    #[serde(default)]
    pub auto_execute: bool,
    /// Concurrency cap on simultaneous executions.
    #[serde(default = "default_max_concurrent_trades")]
    pub max_concurrent_trades: usize,
    /// Balance fraction kept out of sizing, in percent.
    #[serde(default = "default_balance_reserve_pct")]
    pub balance_reserve_pct: Decimal,
    /// Operator risk appetite.
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub notification_thresholds: NotificationThresholds,
}

fn default_min_profit_pct() -> Decimal {
    Decimal::new(5, 1) // 0.5%
}

fn default_max_execution_time_ms() -> u64 {
    30_000
}

fn default_max_concurrent_trades() -> usize {
    3
}

fn default_balance_reserve_pct() -> Decimal {
    Decimal::from(10)
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            min_profit_pct: default_min_profit_pct(),
            max_execution_time_ms: default_max_execution_time_ms(),
            enabled_pairs: Vec::new(),
            enabled_exchanges: Vec::new(),
            auto_execute: false,
            max_concurrent_trades: default_max_concurrent_trades(),
            balance_reserve_pct: default_balance_reserve_pct(),
            risk_level: RiskLevel::default(),
            notification_thresholds: NotificationThresholds::default(),
        }
    }
}

impl ArbitrageConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_profit_pct.is_sign_negative() {
            return Err(format!(
                "min_profit_pct ({}) must be non-negative",
                self.min_profit_pct
            ));
        }

        if self.max_concurrent_trades == 0 {
            return Err("max_concurrent_trades must be at least 1".to_string());
        }

        if self.max_execution_time_ms == 0 {
            return Err("max_execution_time_ms must be positive".to_string());
        }

        if self.balance_reserve_pct.is_sign_negative()
            || self.balance_reserve_pct > Decimal::from(100)
        {
            return Err(format!(
                "balance_reserve_pct ({}) must be within [0, 100]",
                self.balance_reserve_pct
            ));
        }

        if self
            .notification_thresholds
            .profit_pct
            .is_sign_negative()
        {
            return Err(format!(
                "notification profit_pct ({}) must be non-negative",
                self.notification_thresholds.profit_pct
            ));
        }

        Ok(())
    }

    /// True if switching to `next` changes the enabled pairs or
    /// exchanges, which forces a stop-then-restart of feed
    /// subscriptions and analysis scheduling. Order does not matter.
    pub fn requires_restart(&self, next: &ArbitrageConfig) -> bool {
        let pairs: HashSet<&PairId> = self.enabled_pairs.iter().collect();
        let next_pairs: HashSet<&PairId> = next.enabled_pairs.iter().collect();
        if pairs != next_pairs {
            return true;
        }

        let exchanges: HashSet<&ExchangeId> = self.enabled_exchanges.iter().collect();
        let next_exchanges: HashSet<&ExchangeId> = next.enabled_exchanges.iter().collect();
        exchanges != next_exchanges
    }

    /// Wrap into the shared handle handed to the components.
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}
