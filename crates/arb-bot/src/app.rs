//! Main application orchestration.
//!
//! [`ArbitrageApp`] owns every engine component and wires them
//! together: feed normalizer -> opportunity detector -> execution
//! coordinator, all sharing one registry, price book, opportunity
//! store, and event bus. Monitoring is restartable: `start()` builds a
//! fresh normalizer, detector, and event channel each time, so
//! start-stop-start behaves like a cold start while executions and
//! statistics persist across restarts.

use std::sync::Arc;
use std::time::Duration;

use arb_core::{
    ArbEvent, ArbitrageConfig, EventBus, Exchange, Opportunity, OpportunityStore, SharedConfig,
    TradingPair,
};
use arb_detector::{DetectorConfig, OpportunityDetector};
use arb_executor::{
    DynLegExecutor, DynOpportunityExecutor, ExecutionCoordinator, SimulatedLegExecutor,
    StatsReport,
};
use arb_feed::{AdapterRegistry, FeedConfig, FeedNormalizer, MarketEvent, PriceBook};
use arb_registry::MarketRegistry;
use arb_telemetry::Metrics;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Run-statistics output interval.
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Canonical-event channel capacity between the feed and the detector.
const EVENT_BUFFER: usize = 1024;

/// Components built fresh on every `start()`.
struct ActiveMonitor {
    normalizer: Arc<FeedNormalizer>,
    detector: Arc<OpportunityDetector>,
    detector_task: JoinHandle<()>,
}

/// Main application.
pub struct ArbitrageApp {
    config: SharedConfig,
    detector_config: DetectorConfig,
    feed_config: FeedConfig,
    registry: Arc<MarketRegistry>,
    adapters: Arc<AdapterRegistry>,
    store: Arc<OpportunityStore>,
    book: Arc<PriceBook>,
    bus: EventBus,
    coordinator: Arc<ExecutionCoordinator>,
    active: Mutex<Option<ActiveMonitor>>,
}

impl ArbitrageApp {
    /// Validate the configuration and build every long-lived component.
    ///
    /// Nothing connects until [`start`] runs.
    ///
    /// [`start`]: ArbitrageApp::start
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let registry = Arc::new(MarketRegistry::new());
        for exchange in &config.exchanges {
            registry.register_exchange(exchange.clone())?;
        }
        for pair in &config.pairs {
            registry.register_pair(pair.clone())?;
        }

        let shared = config.arbitrage.clone().into_shared();
        let store = Arc::new(OpportunityStore::new());
        let book = Arc::new(PriceBook::new());
        let bus = EventBus::default();
        let legs: DynLegExecutor = Arc::new(SimulatedLegExecutor::new());
        let coordinator = Arc::new(ExecutionCoordinator::new(
            store.clone(),
            registry.clone(),
            book.clone(),
            shared.clone(),
            bus.clone(),
            legs,
        ));

        info!(
            exchanges = registry.exchange_count(),
            pairs = registry.pair_count(),
            "Application components built"
        );

        Ok(Self {
            config: shared,
            detector_config: config.detector,
            feed_config: config.feed,
            registry,
            adapters: Arc::new(AdapterRegistry::with_defaults()),
            store,
            book,
            bus,
            coordinator,
            active: Mutex::new(None),
        })
    }

    /// Start monitoring: connect feeds, subscribe the enabled markets,
    /// and spawn the detector loop.
    ///
    /// A warning plus no-op when already active or when the enabled
    /// sets are empty.
    pub fn start(&self) -> AppResult<()> {
        let mut active = self.active.lock();
        if active.is_some() {
            warn!("Monitoring already active, ignoring start");
            return Ok(());
        }

        let (enabled_pairs, enabled_exchanges) = {
            let config = self.config.read();
            (
                config.enabled_pairs.clone(),
                config.enabled_exchanges.clone(),
            )
        };
        if enabled_pairs.is_empty() || enabled_exchanges.is_empty() {
            warn!("No enabled pairs or exchanges configured, start is a no-op");
            return Ok(());
        }

        let (event_tx, event_rx) = mpsc::channel::<MarketEvent>(EVENT_BUFFER);
        let normalizer = Arc::new(FeedNormalizer::new(
            self.registry.clone(),
            self.adapters.clone(),
            self.book.clone(),
            self.bus.clone(),
            event_tx,
            self.feed_config.clone(),
        ));
        normalizer.initialize()?;
        normalizer.connect_all();

        for pair in &enabled_pairs {
            for exchange in self.registry.exchanges_for_pair(pair) {
                if !enabled_exchanges.contains(&exchange.id) {
                    continue;
                }
                normalizer.subscribe(&exchange.id, pair)?;
            }
        }

        let executor: DynOpportunityExecutor = self.coordinator.clone();
        let detector = Arc::new(
            OpportunityDetector::new(
                self.registry.clone(),
                self.book.clone(),
                self.store.clone(),
                self.config.clone(),
                self.detector_config.clone(),
                self.bus.clone(),
                self.coordinator.stats_handle(),
            )
            .with_executor(executor),
        );
        let detector_task = tokio::spawn(detector.clone().run(event_rx));

        *active = Some(ActiveMonitor {
            normalizer,
            detector,
            detector_task,
        });
        info!(
            pairs = enabled_pairs.len(),
            exchanges = enabled_exchanges.len(),
            "Arbitrage monitoring started"
        );
        Ok(())
    }

    /// Stop monitoring: cancel pending analyses, withdraw every
    /// subscription, and close every connection. Idempotent.
    pub fn stop(&self) {
        let Some(monitor) = self.active.lock().take() else {
            return;
        };
        monitor.detector.stop();
        monitor.normalizer.stop();
        monitor.detector_task.abort();
        info!("Arbitrage monitoring stopped");
    }

    /// Swap the runtime configuration. Changing the enabled pairs or
    /// exchanges while monitoring is active stops and restarts feed
    /// subscriptions and analysis scheduling.
    pub fn update_config(&self, next: ArbitrageConfig) -> AppResult<()> {
        next.validate().map_err(AppError::Config)?;
        for exchange in &next.enabled_exchanges {
            if !self.registry.contains_exchange(exchange) {
                return Err(AppError::Config(format!(
                    "enabled exchange {exchange} is not registered"
                )));
            }
        }
        for pair in &next.enabled_pairs {
            if !self.registry.contains_pair(pair) {
                return Err(AppError::Config(format!(
                    "enabled pair {pair} is not registered"
                )));
            }
        }

        let restart = {
            let mut config = self.config.write();
            let restart = config.requires_restart(&next);
            *config = next;
            restart
        };

        if restart && self.is_active() {
            info!("Enabled markets changed, restarting subscriptions");
            self.stop();
            self.start()?;
        } else {
            info!(restart_needed = restart, "Runtime configuration updated");
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Subscribe to the outbound event stream.
    pub fn events(&self) -> broadcast::Receiver<ArbEvent> {
        self.bus.subscribe()
    }

    /// Every retained opportunity, including finished ones.
    pub fn opportunities(&self) -> Vec<Opportunity> {
        self.store.all()
    }

    pub fn opportunity(&self, id: &Uuid) -> Option<Opportunity> {
        self.store.snapshot(id)
    }

    /// Point-in-time run report.
    pub fn stats(&self) -> StatsReport {
        self.coordinator.stats()
    }

    pub fn supported_exchanges(&self) -> Vec<Arc<Exchange>> {
        self.registry.exchanges()
    }

    pub fn supported_pairs(&self) -> Vec<Arc<TradingPair>> {
        self.registry.pairs()
    }

    /// Run until ctrl-c: start monitoring, drive metrics off bus
    /// events, and log statistics periodically and on exit.
    pub async fn run(&self) -> AppResult<()> {
        self.start()?;

        let mut events = self.bus.subscribe();
        let mut stats_ticker = tokio::time::interval(STATS_INTERVAL);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = stats_ticker.tick() => self.log_stats(),
                event = events.recv() => match event {
                    Ok(event) => self.on_bus_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event loop lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        self.stop();
        self.log_stats();
        Ok(())
    }

    /// Components log their own actions; this loop owns the metrics
    /// and the high-profit alert.
    fn on_bus_event(&self, event: &ArbEvent) {
        Metrics::event_seen(event.name());
        match event {
            ArbEvent::OpportunityDetected(opportunity) => {
                Metrics::opportunity_detected(opportunity.pair.as_str());
            }
            ArbEvent::HighProfitOpportunity(opportunity) => {
                info!(
                    id = %opportunity.id,
                    pair = %opportunity.pair,
                    buy = %opportunity.buy_exchange,
                    sell = %opportunity.sell_exchange,
                    profit_pct = %opportunity.profit_pct,
                    "High-profit opportunity"
                );
            }
            ArbEvent::ExecutionStarted(_) => {
                Metrics::executing_set(self.coordinator.executing_count() as i64);
            }
            ArbEvent::ExecutionCompleted(opportunity) => {
                let profit = opportunity
                    .execution
                    .as_ref()
                    .map(|details| details.actual_profit)
                    .unwrap_or_default();
                Metrics::execution_completed(profit.to_f64().unwrap_or(0.0));
                Metrics::executing_set(self.coordinator.executing_count() as i64);
            }
            ArbEvent::ExecutionFailed { opportunity, error } => {
                debug!(id = %opportunity.id, error = %error, "Execution failure recorded");
                Metrics::execution_failed();
                Metrics::executing_set(self.coordinator.executing_count() as i64);
            }
            ArbEvent::MaxReconnectAttemptsReached { exchange } => {
                Metrics::reconnect_exhausted(exchange.as_str());
            }
        }
    }

    fn log_stats(&self) {
        let report = self.coordinator.stats();
        info!(
            analyses = report.analysis_count,
            detected = report.opportunities_detected,
            executed = report.opportunities_executed,
            failed = report.executions_failed,
            total_profit = %report.total_profit,
            active_opportunities = report.active_opportunities,
            executing = report.executing_count,
            "Run statistics"
        );
        Metrics::executing_set(report.executing_count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_core::{ExchangeId, PairId};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn sample_exchange(id: &str) -> Exchange {
        Exchange {
            id: ExchangeId::new(id),
            name: id.to_string(),
            // Unroutable endpoint so connection attempts fail fast.
            ws_url: "ws://127.0.0.1:1".to_string(),
            rest_url: format!("https://{id}.example.com"),
            fee_rate: dec!(0.001),
            withdrawal_fees: HashMap::new(),
            supported_assets: Vec::new(),
        }
    }

    fn sample_config() -> AppConfig {
        let pair = PairId::new("BTC", "USDT");
        let mut config = AppConfig {
            exchanges: vec![sample_exchange("binance"), sample_exchange("coinbase")],
            pairs: vec![TradingPair {
                id: pair.clone(),
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                min_order_size: dec!(0.0001),
                max_order_size: dec!(10),
                price_decimals: 2,
                quantity_decimals: 5,
                exchange_ids: vec![ExchangeId::new("binance"), ExchangeId::new("coinbase")],
            }],
            ..Default::default()
        };
        config.arbitrage.enabled_pairs = vec![pair];
        config.arbitrage.enabled_exchanges =
            vec![ExchangeId::new("binance"), ExchangeId::new("coinbase")];
        config
    }

    #[test]
    fn test_new_rejects_unknown_enabled_market() {
        let mut config = sample_config();
        config
            .arbitrage
            .enabled_exchanges
            .push(ExchangeId::new("kraken"));
        assert!(matches!(
            ArbitrageApp::new(config),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_start_without_enabled_markets_is_noop() {
        let mut config = sample_config();
        config.arbitrage.enabled_pairs.clear();
        let app = ArbitrageApp::new(config).unwrap();

        app.start().unwrap();
        assert!(!app.is_active());
    }

    #[tokio::test]
    async fn test_start_stop_restart() {
        let app = ArbitrageApp::new(sample_config()).unwrap();

        app.start().unwrap();
        assert!(app.is_active());
        // Second start is a no-op, not an error.
        app.start().unwrap();
        assert!(app.is_active());

        app.stop();
        assert!(!app.is_active());
        app.stop();

        app.start().unwrap();
        assert!(app.is_active());
        app.stop();
    }

    #[test]
    fn test_queries_reflect_registry() {
        let app = ArbitrageApp::new(sample_config()).unwrap();

        assert_eq!(app.supported_exchanges().len(), 2);
        assert_eq!(app.supported_pairs().len(), 1);
        assert!(app.opportunities().is_empty());
        assert!(app.opportunity(&Uuid::new_v4()).is_none());

        let report = app.stats();
        assert_eq!(report.analysis_count, 0);
        assert_eq!(report.executing_count, 0);
    }

    #[test]
    fn test_update_config_rejects_invalid() {
        let app = ArbitrageApp::new(sample_config()).unwrap();

        let mut next = app.config.read().clone();
        next.max_concurrent_trades = 0;
        assert!(app.update_config(next).is_err());

        let mut next = app.config.read().clone();
        next.enabled_pairs.push(PairId::new("ETH", "USDT"));
        assert!(matches!(
            app.update_config(next),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_update_config_hot_swaps_thresholds() {
        let app = ArbitrageApp::new(sample_config()).unwrap();
        app.start().unwrap();

        let mut next = app.config.read().clone();
        next.min_profit_pct = dec!(2);
        next.auto_execute = true;
        app.update_config(next).unwrap();

        // Threshold changes apply in place without a restart.
        assert!(app.is_active());
        assert_eq!(app.config.read().min_profit_pct, dec!(2));
        app.stop();
    }

    #[tokio::test]
    async fn test_update_config_restarts_on_market_change() {
        let app = ArbitrageApp::new(sample_config()).unwrap();
        app.start().unwrap();

        let mut next = app.config.read().clone();
        next.enabled_exchanges.retain(|id| id.as_str() == "binance");
        app.update_config(next).unwrap();

        assert!(app.is_active());
        assert_eq!(app.config.read().enabled_exchanges.len(), 1);
        app.stop();
    }
}
