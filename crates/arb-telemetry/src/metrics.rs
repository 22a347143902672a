//! Prometheus metrics for the arbitrage bot.
//!
//! All metrics live on the default global registry and are updated by
//! the application event loop from bus events. No exposition endpoint
//! is bundled; embedders scrape or push the registry themselves.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. Registration only
//! fails on duplicate metric names, a fatal startup defect, and only
//! ever runs during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_int_gauge, CounterVec, Gauge, IntGauge,
};

/// Bus events observed by the application loop.
pub static EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "arb_events_total",
        "Total bus events observed by the application loop",
        &["event"]
    )
    .unwrap()
});

/// Opportunities detected per pair.
pub static OPPORTUNITIES_DETECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "arb_opportunities_detected_total",
        "Total arbitrage opportunities detected",
        &["pair"]
    )
    .unwrap()
});

/// Finished executions by outcome.
pub static EXECUTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "arb_executions_total",
        "Total finished executions by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Cumulative realized profit in quote units.
pub static REALIZED_PROFIT: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "arb_realized_profit",
        "Cumulative realized profit in quote units"
    )
    .unwrap()
});

/// Opportunities currently in their execution window.
pub static EXECUTING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("arb_executing", "Opportunities currently executing").unwrap()
});

/// Feeds that gave up reconnecting.
pub static RECONNECT_EXHAUSTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "arb_reconnect_exhausted_total",
        "Feeds that exhausted their reconnection attempts",
        &["exchange"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record one observed bus event.
    pub fn event_seen(event: &str) {
        EVENTS_TOTAL.with_label_values(&[event]).inc();
    }

    /// Record a detected opportunity.
    pub fn opportunity_detected(pair: &str) {
        OPPORTUNITIES_DETECTED_TOTAL
            .with_label_values(&[pair])
            .inc();
    }

    /// Record a completed execution and its net profit.
    pub fn execution_completed(profit: f64) {
        EXECUTIONS_TOTAL.with_label_values(&["completed"]).inc();
        REALIZED_PROFIT.add(profit);
    }

    /// Record a failed execution.
    pub fn execution_failed() {
        EXECUTIONS_TOTAL.with_label_values(&["failed"]).inc();
    }

    /// Update the executing gauge.
    pub fn executing_set(count: i64) {
        EXECUTING.set(count);
    }

    /// Record a feed that gave up reconnecting.
    pub fn reconnect_exhausted(exchange: &str) {
        RECONNECT_EXHAUSTED_TOTAL
            .with_label_values(&[exchange])
            .inc();
    }
}
