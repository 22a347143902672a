//! Shared run counters.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;

/// Monotonic counters shared by the detector and the coordinator.
///
/// The detector records analyses and detections; the coordinator
/// records outcomes and realized profit.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    analyses: AtomicU64,
    detected: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    total_profit: RwLock<Decimal>,
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_analysis(&self) {
        self.analyses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection(&self) {
        self.detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, profit: Decimal) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        *self.total_profit.write() += profit;
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn analyses(&self) -> u64 {
        self.analyses.load(Ordering::Relaxed)
    }

    pub fn detected(&self) -> u64 {
        self.detected.load(Ordering::Relaxed)
    }

    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn total_profit(&self) -> Decimal {
        *self.total_profit.read()
    }

    /// Mean realized profit per executed trade; zero before the first.
    pub fn average_profit(&self) -> Decimal {
        let executed = self.executed();
        if executed == 0 {
            return Decimal::ZERO;
        }
        self.total_profit() / Decimal::from(executed)
    }
}

/// Point-in-time report assembled by the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub analysis_count: u64,
    pub opportunities_detected: u64,
    pub opportunities_executed: u64,
    pub executions_failed: u64,
    pub total_profit: Decimal,
    pub average_profit: Decimal,
    /// Opportunities currently in DETECTED state.
    pub active_opportunities: usize,
    /// Executions currently holding an admission slot.
    pub executing_count: usize,
}
