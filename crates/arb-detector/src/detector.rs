//! Debounced cross-exchange opportunity detection.
//!
//! The detector consumes normalized market events and turns them into
//! per-pair analysis runs. Scheduling is debounced and rate-limited per
//! pair; the analysis itself compares every enabled exchange pairing in
//! both directions and stores an [`Opportunity`] for each profitable
//! one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use arb_core::{
    direction_profit, ArbEvent, EventBus, Exchange, MarketKey, Opportunity, OpportunityStore,
    PairId, PriceSnapshot, SharedConfig,
};
use arb_executor::{DynOpportunityExecutor, ExecutionStats};
use arb_feed::{MarketEvent, PriceBook};
use arb_registry::MarketRegistry;

use crate::config::DetectorConfig;
use crate::debounce::DelayedTask;

/// Per-pair scheduling state.
#[derive(Default)]
struct PairGate {
    analyzing: AtomicBool,
    last_analysis: Mutex<Option<Instant>>,
    pending: Mutex<Option<DelayedTask>>,
}

pub struct OpportunityDetector {
    registry: Arc<MarketRegistry>,
    book: Arc<PriceBook>,
    store: Arc<OpportunityStore>,
    config: SharedConfig,
    detector_config: DetectorConfig,
    bus: EventBus,
    stats: Arc<ExecutionStats>,
    executor: Option<DynOpportunityExecutor>,
    gates: DashMap<PairId, Arc<PairGate>>,
    cancel: CancellationToken,
}

impl OpportunityDetector {
    pub fn new(
        registry: Arc<MarketRegistry>,
        book: Arc<PriceBook>,
        store: Arc<OpportunityStore>,
        config: SharedConfig,
        detector_config: DetectorConfig,
        bus: EventBus,
        stats: Arc<ExecutionStats>,
    ) -> Self {
        Self {
            registry,
            book,
            store,
            config,
            detector_config,
            bus,
            stats,
            executor: None,
            gates: DashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach the auto-execution seam.
    pub fn with_executor(mut self, executor: DynOpportunityExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Consume market events until the channel closes or [`stop`] is
    /// called.
    ///
    /// Every enabled pair gets one immediate analysis on entry;
    /// afterwards analyses are event-driven and debounced.
    ///
    /// [`stop`]: OpportunityDetector::stop
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<MarketEvent>) {
        info!("Opportunity detector started");
        self.schedule_enabled_pairs(Duration::ZERO);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("Opportunity detector stopped");
                    break;
                }
                maybe = events.recv() => {
                    match maybe {
                        Some(event) => self.on_market_event(&event),
                        None => {
                            info!("Market event channel closed, detector exiting");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Cancel the event loop and drop all pending analysis timers.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.gates.clear();
    }

    /// Event-driven trigger. Filters disabled markets, then debounces.
    fn on_market_event(self: &Arc<Self>, event: &MarketEvent) {
        let key = event.key();
        {
            let config = self.config.read();
            if !config.enabled_exchanges.contains(&key.exchange)
                || !config.enabled_pairs.contains(&key.pair)
            {
                return;
            }
        }
        self.schedule_analysis(
            key.pair.clone(),
            Duration::from_millis(self.detector_config.debounce_ms),
        );
    }

    fn schedule_enabled_pairs(self: &Arc<Self>, delay: Duration) {
        let pairs = self.config.read().enabled_pairs.clone();
        for pair in pairs {
            self.schedule_analysis(pair, delay);
        }
    }

    /// (Re)schedule a debounced analysis for one pair.
    ///
    /// No-op while the pair is being analyzed or still inside its
    /// minimum analysis interval. A pending timer is replaced, not
    /// stacked, so bursts of market events collapse into one run.
    fn schedule_analysis(self: &Arc<Self>, pair: PairId, delay: Duration) {
        let gate = self.gate(&pair);
        if gate.analyzing.load(Ordering::Acquire) {
            return;
        }
        let interval = Duration::from_millis(self.detector_config.min_analysis_interval_ms);
        if let Some(last) = *gate.last_analysis.lock() {
            if last.elapsed() < interval {
                return;
            }
        }

        let detector = Arc::clone(self);
        let scheduled = pair.clone();
        let task = DelayedTask::spawn(delay, move || async move {
            detector.analyze_pair(&scheduled).await;
        });
        *gate.pending.lock() = Some(task);
    }

    /// Analyze one pair across all enabled exchanges, both directions
    /// per exchange pairing.
    ///
    /// The per-pair analysis lock is released on every path out.
    pub async fn analyze_pair(&self, pair: &PairId) {
        let gate = self.gate(pair);
        if gate
            .analyzing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(%pair, "Analysis already running, skipping");
            return;
        }
        *gate.last_analysis.lock() = Some(Instant::now());
        self.stats.record_analysis();

        self.evaluate(pair);

        gate.analyzing.store(false, Ordering::Release);
    }

    fn gate(&self, pair: &PairId) -> Arc<PairGate> {
        self.gates
            .entry(pair.clone())
            .or_insert_with(|| Arc::new(PairGate::default()))
            .clone()
    }

    fn evaluate(&self, pair: &PairId) {
        let enabled = self.config.read().enabled_exchanges.clone();
        let venues: Vec<(Arc<Exchange>, PriceSnapshot)> = self
            .registry
            .exchanges_for_pair(pair)
            .into_iter()
            .filter(|exchange| enabled.contains(&exchange.id))
            .filter_map(|exchange| {
                let key = MarketKey::new(exchange.id.clone(), pair.clone());
                self.book
                    .get(&key)
                    .filter(PriceSnapshot::is_valid)
                    .map(|snapshot| (exchange, snapshot))
            })
            .collect();

        if venues.len() < 2 {
            debug!(%pair, venues = venues.len(), "Not enough quoted venues to compare");
            return;
        }

        for i in 0..venues.len() {
            for j in (i + 1)..venues.len() {
                self.check_direction(pair, &venues[i], &venues[j]);
                self.check_direction(pair, &venues[j], &venues[i]);
            }
        }
    }

    /// Evaluate buying on one venue and selling on another. Fee and
    /// spread math is not symmetric, so each ordering is its own check.
    fn check_direction(
        &self,
        pair: &PairId,
        buy: &(Arc<Exchange>, PriceSnapshot),
        sell: &(Arc<Exchange>, PriceSnapshot),
    ) {
        let (buy_exchange, buy_quote) = buy;
        let (sell_exchange, sell_quote) = sell;

        let profit = direction_profit(
            buy_quote.ask,
            sell_quote.bid,
            buy_exchange.fee_rate,
            sell_exchange.fee_rate,
        );
        if !profit.is_profitable() {
            return;
        }

        let opportunity = Opportunity::new(
            pair.clone(),
            buy_exchange.id.clone(),
            sell_exchange.id.clone(),
            buy_quote.ask,
            sell_quote.bid,
            profit.per_unit,
            profit.pct,
            tradeable_size(buy_quote, sell_quote),
            volume_confidence(buy_quote, sell_quote),
            self.detector_config.estimated_execution_time_ms,
        );

        self.stats.record_detection();
        info!(
            id = %opportunity.id,
            %pair,
            buy = %opportunity.buy_exchange,
            sell = %opportunity.sell_exchange,
            profit_pct = %opportunity.profit_pct,
            max_size = %opportunity.max_size,
            "Opportunity detected"
        );

        let (min_profit_pct, auto_execute, notify_pct) = {
            let config = self.config.read();
            (
                config.min_profit_pct,
                config.auto_execute,
                config.notification_thresholds.profit_pct,
            )
        };

        self.store.insert(opportunity.clone());
        self.bus
            .emit(ArbEvent::OpportunityDetected(opportunity.clone()));
        if opportunity.profit_pct >= notify_pct {
            self.bus
                .emit(ArbEvent::HighProfitOpportunity(opportunity.clone()));
        }

        if auto_execute && opportunity.profit_pct >= min_profit_pct {
            if let Some(executor) = &self.executor {
                let executor = Arc::clone(executor);
                let id = opportunity.id;
                tokio::spawn(async move {
                    executor.execute_opportunity(id).await;
                });
            }
        }
    }
}

/// Size an opportunity from visible depth.
///
/// Walks ask liquidity up to 0.5% above the buy price and bid liquidity
/// down to 0.5% below the sell price; the executable size is the
/// smaller side. Without depth on both sides falls back to one unit.
fn tradeable_size(buy: &PriceSnapshot, sell: &PriceSnapshot) -> Decimal {
    let (Some(buy_depth), Some(sell_depth)) = (&buy.depth, &sell.depth) else {
        return Decimal::ONE;
    };
    let buy_limit = buy.ask * (Decimal::ONE + Decimal::new(5, 3));
    let sell_floor = sell.bid * (Decimal::ONE - Decimal::new(5, 3));
    buy_depth
        .ask_liquidity_within(buy_limit)
        .min(sell_depth.bid_liquidity_within(sell_floor))
}

/// Confidence score for an opportunity.
///
/// 0.7 when either side lacks a 24h volume figure; otherwise scaled
/// with the average volume and capped at 0.95.
fn volume_confidence(buy: &PriceSnapshot, sell: &PriceSnapshot) -> Decimal {
    match (buy.volume_24h, sell.volume_24h) {
        (Some(buy_volume), Some(sell_volume)) => {
            let average = (buy_volume + sell_volume) / Decimal::TWO;
            let scaled = Decimal::new(5, 1) + average / Decimal::from(1000) * Decimal::new(1, 1);
            scaled.min(Decimal::new(95, 2))
        }
        _ => Decimal::new(7, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_core::{
        ArbitrageConfig, BookUpdate, DepthLevel, ExchangeId, OrderBookDepth, TickerUpdate,
        TradingPair,
    };
    use arb_executor::{BoxFuture, OpportunityExecutor};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_registry() -> Arc<MarketRegistry> {
        let registry = MarketRegistry::new();
        for id in ["binance", "coinbase", "kraken"] {
            registry
                .register_exchange(Exchange {
                    id: ExchangeId::new(id),
                    name: id.to_string(),
                    ws_url: format!("wss://{id}.invalid/ws"),
                    rest_url: format!("https://{id}.invalid"),
                    fee_rate: dec!(0.001),
                    withdrawal_fees: Default::default(),
                    supported_assets: Vec::new(),
                })
                .unwrap();
        }
        registry
            .register_pair(TradingPair {
                id: pair(),
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                min_order_size: dec!(0.001),
                max_order_size: dec!(100),
                price_decimals: 2,
                quantity_decimals: 6,
                exchange_ids: vec![
                    ExchangeId::new("binance"),
                    ExchangeId::new("coinbase"),
                    ExchangeId::new("kraken"),
                ],
            })
            .unwrap();
        Arc::new(registry)
    }

    fn pair() -> PairId {
        PairId::new("BTC", "USDT")
    }

    fn sample_config() -> ArbitrageConfig {
        ArbitrageConfig {
            enabled_pairs: vec![pair()],
            enabled_exchanges: vec![ExchangeId::new("binance"), ExchangeId::new("coinbase")],
            ..Default::default()
        }
    }

    struct Harness {
        detector: Arc<OpportunityDetector>,
        store: Arc<OpportunityStore>,
        book: Arc<PriceBook>,
        bus: EventBus,
        stats: Arc<ExecutionStats>,
    }

    fn harness(config: ArbitrageConfig, detector_config: DetectorConfig) -> Harness {
        let store = Arc::new(OpportunityStore::new());
        let book = Arc::new(PriceBook::new());
        let bus = EventBus::default();
        let stats = Arc::new(ExecutionStats::new());
        let detector = Arc::new(OpportunityDetector::new(
            sample_registry(),
            book.clone(),
            store.clone(),
            config.into_shared(),
            detector_config,
            bus.clone(),
            stats.clone(),
        ));
        Harness {
            detector,
            store,
            book,
            bus,
            stats,
        }
    }

    fn quote(book: &PriceBook, exchange: &str, bid: Decimal, ask: Decimal) {
        book.apply_ticker(
            &MarketKey::new(ExchangeId::new(exchange), pair()),
            &TickerUpdate::new(bid, ask, None),
        );
    }

    #[tokio::test]
    async fn test_analyze_detects_profitable_direction() {
        let h = harness(sample_config(), DetectorConfig::default());
        let mut rx = h.bus.subscribe();
        quote(&h.book, "binance", dec!(99.9), dec!(100));
        quote(&h.book, "coinbase", dec!(101), dec!(101.1));

        h.detector.analyze_pair(&pair()).await;

        let opportunities = h.store.all();
        assert_eq!(opportunities.len(), 1);
        let detected = &opportunities[0];
        assert_eq!(detected.buy_exchange, ExchangeId::new("binance"));
        assert_eq!(detected.sell_exchange, ExchangeId::new("coinbase"));
        assert_eq!(detected.buy_price, dec!(100));
        assert_eq!(detected.sell_price, dec!(101));
        // sell 101*0.999 = 100.899, buy 100*1.001 = 100.1
        assert_eq!(detected.profit_per_unit, dec!(0.799));
        assert_eq!(detected.max_size, dec!(1));
        assert_eq!(detected.confidence, dec!(0.7));
        assert_eq!(detected.estimated_execution_time_ms, 3_000);

        assert_eq!(rx.recv().await.unwrap().name(), "opportunity_detected");
        assert!(rx.try_recv().is_err(), "0.8% must not be high-profit");
        assert_eq!(h.stats.analyses(), 1);
        assert_eq!(h.stats.detected(), 1);
    }

    #[tokio::test]
    async fn test_both_directions_are_independent() {
        let h = harness(sample_config(), DetectorConfig::default());
        // Books crossed against each other: profitable both ways.
        quote(&h.book, "binance", dec!(102), dec!(100));
        quote(&h.book, "coinbase", dec!(101.5), dec!(100.5));

        h.detector.analyze_pair(&pair()).await;

        let opportunities = h.store.all();
        assert_eq!(opportunities.len(), 2);
        let directions: Vec<(ExchangeId, ExchangeId)> = opportunities
            .iter()
            .map(|o| (o.buy_exchange.clone(), o.sell_exchange.clone()))
            .collect();
        assert!(
            directions.contains(&(ExchangeId::new("binance"), ExchangeId::new("coinbase"))),
            "missing binance -> coinbase"
        );
        assert!(
            directions.contains(&(ExchangeId::new("coinbase"), ExchangeId::new("binance"))),
            "missing coinbase -> binance"
        );
    }

    #[tokio::test]
    async fn test_requires_two_valid_venues() {
        let h = harness(sample_config(), DetectorConfig::default());
        quote(&h.book, "binance", dec!(99.9), dec!(100));
        // Half-quoted venue does not count.
        quote(&h.book, "coinbase", dec!(0), dec!(101.1));

        h.detector.analyze_pair(&pair()).await;

        assert!(h.store.is_empty());
        assert_eq!(h.stats.analyses(), 1);
        assert_eq!(h.stats.detected(), 0);
    }

    #[tokio::test]
    async fn test_spread_inside_fees_ignored() {
        let h = harness(sample_config(), DetectorConfig::default());
        // 0.05% gross spread cannot cover 0.1% per leg.
        quote(&h.book, "binance", dec!(99.9), dec!(100));
        quote(&h.book, "coinbase", dec!(100.05), dec!(100.15));

        h.detector.analyze_pair(&pair()).await;

        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_depth_caps_size() {
        let h = harness(sample_config(), DetectorConfig::default());
        h.book.apply_book(
            &MarketKey::new(ExchangeId::new("binance"), pair()),
            &BookUpdate::new(OrderBookDepth::new(
                vec![DepthLevel::new(dec!(99.9), dec!(1))],
                vec![
                    DepthLevel::new(dec!(100), dec!(2)),
                    DepthLevel::new(dec!(100.4), dec!(3)),
                    DepthLevel::new(dec!(101), dec!(5)),
                ],
            )),
        );
        h.book.apply_book(
            &MarketKey::new(ExchangeId::new("coinbase"), pair()),
            &BookUpdate::new(OrderBookDepth::new(
                vec![
                    DepthLevel::new(dec!(101), dec!(1.5)),
                    DepthLevel::new(dec!(100.6), dec!(2)),
                    DepthLevel::new(dec!(100), dec!(9)),
                ],
                vec![DepthLevel::new(dec!(101.1), dec!(1))],
            )),
        );

        h.detector.analyze_pair(&pair()).await;

        let opportunities = h.store.all();
        assert_eq!(opportunities.len(), 1);
        // Buy side: asks within 100*1.005 sum to 5.
        // Sell side: bids within 101*0.995 sum to 3.5.
        assert_eq!(opportunities[0].max_size, dec!(3.5));
    }

    #[test]
    fn test_volume_confidence_scaling() {
        let key = MarketKey::new(ExchangeId::new("binance"), pair());
        let with_volume = |volume: Option<Decimal>| {
            PriceSnapshot::from_ticker(key.clone(), &TickerUpdate::new(dec!(100), dec!(101), volume))
        };

        let quiet = with_volume(Some(dec!(1000)));
        assert_eq!(volume_confidence(&quiet, &quiet), dec!(0.6));

        let busy = with_volume(Some(dec!(10000)));
        assert_eq!(volume_confidence(&busy, &busy), dec!(0.95));

        let unknown = with_volume(None);
        assert_eq!(volume_confidence(&quiet, &unknown), dec!(0.7));
    }

    #[tokio::test]
    async fn test_triggers_inside_debounce_window_coalesce() {
        let h = harness(
            sample_config(),
            DetectorConfig {
                min_analysis_interval_ms: 500,
                debounce_ms: 60,
                ..Default::default()
            },
        );
        quote(&h.book, "binance", dec!(99.9), dec!(100));
        quote(&h.book, "coinbase", dec!(101), dec!(101.1));

        let delay = Duration::from_millis(60);
        h.detector.schedule_analysis(pair(), delay);
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.detector.schedule_analysis(pair(), delay);
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.detector.schedule_analysis(pair(), delay);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(h.stats.analyses(), 1, "burst must collapse into one run");

        // Inside the minimum interval further triggers are dropped.
        h.detector.schedule_analysis(pair(), delay);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.stats.analyses(), 1);
    }

    #[tokio::test]
    async fn test_run_gates_event_driven_analyses() {
        let h = harness(
            sample_config(),
            DetectorConfig {
                min_analysis_interval_ms: 100,
                debounce_ms: 10,
                ..Default::default()
            },
        );
        quote(&h.book, "binance", dec!(99.9), dec!(100));
        quote(&h.book, "coinbase", dec!(101), dec!(101.1));

        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(h.detector.clone().run(rx));

        let ticker_event = || MarketEvent::Ticker {
            key: MarketKey::new(ExchangeId::new("binance"), pair()),
            update: TickerUpdate::new(dec!(99.9), dec!(100), None),
        };

        // Start-of-monitoring sweep runs immediately.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.stats.analyses(), 1);
        assert_eq!(h.store.len(), 1);

        // An event inside the minimum interval is absorbed.
        tx.send(ticker_event()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.stats.analyses(), 1);

        // Past the interval the next event schedules a fresh run.
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(ticker_event()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(h.stats.analyses(), 2);

        h.detector.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_ignores_disabled_markets() {
        let h = harness(
            sample_config(),
            DetectorConfig {
                min_analysis_interval_ms: 50,
                debounce_ms: 10,
                ..Default::default()
            },
        );

        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(h.detector.clone().run(rx));
        tokio::time::sleep(Duration::from_millis(40)).await;
        let after_sweep = h.stats.analyses();

        // kraken is registered but not enabled; ETH/USDT is not enabled.
        tx.send(MarketEvent::Ticker {
            key: MarketKey::new(ExchangeId::new("kraken"), pair()),
            update: TickerUpdate::new(dec!(99), dec!(100), None),
        })
        .await
        .unwrap();
        tx.send(MarketEvent::Ticker {
            key: MarketKey::new(ExchangeId::new("binance"), PairId::new("ETH", "USDT")),
            update: TickerUpdate::new(dec!(99), dec!(100), None),
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(h.stats.analyses(), after_sweep);

        h.detector.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_exits_when_channel_closes() {
        let h = harness(sample_config(), DetectorConfig::default());
        let (tx, rx) = mpsc::channel::<MarketEvent>(4);
        let handle = tokio::spawn(h.detector.clone().run(rx));
        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_timer() {
        let h = harness(
            sample_config(),
            DetectorConfig {
                debounce_ms: 100,
                ..Default::default()
            },
        );
        quote(&h.book, "binance", dec!(99.9), dec!(100));
        quote(&h.book, "coinbase", dec!(101), dec!(101.1));

        h.detector
            .schedule_analysis(pair(), Duration::from_millis(100));
        h.detector.stop();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(h.stats.analyses(), 0);
    }

    #[tokio::test]
    async fn test_high_profit_event_emitted() {
        let h = harness(sample_config(), DetectorConfig::default());
        let mut rx = h.bus.subscribe();
        quote(&h.book, "binance", dec!(99.9), dec!(100));
        quote(&h.book, "coinbase", dec!(102.5), dec!(102.6));

        h.detector.analyze_pair(&pair()).await;

        assert_eq!(rx.recv().await.unwrap().name(), "opportunity_detected");
        assert_eq!(rx.recv().await.unwrap().name(), "high_profit_opportunity");
    }

    struct RecordingExecutor {
        calls: Mutex<Vec<Uuid>>,
    }

    impl RecordingExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Uuid> {
            self.calls.lock().clone()
        }
    }

    impl OpportunityExecutor for RecordingExecutor {
        fn execute_opportunity(&self, id: Uuid) -> BoxFuture<'_, bool> {
            Box::pin(async move {
                self.calls.lock().push(id);
                true
            })
        }
    }

    fn auto_execute_harness(config: ArbitrageConfig) -> (Harness, Arc<RecordingExecutor>) {
        let executor = RecordingExecutor::new();
        let store = Arc::new(OpportunityStore::new());
        let book = Arc::new(PriceBook::new());
        let bus = EventBus::default();
        let stats = Arc::new(ExecutionStats::new());
        let detector = Arc::new(
            OpportunityDetector::new(
                sample_registry(),
                book.clone(),
                store.clone(),
                config.into_shared(),
                DetectorConfig::default(),
                bus.clone(),
                stats.clone(),
            )
            .with_executor(executor.clone()),
        );
        (
            Harness {
                detector,
                store,
                book,
                bus,
                stats,
            },
            executor,
        )
    }

    #[tokio::test]
    async fn test_auto_execute_fires_above_min_profit() {
        let (h, executor) = auto_execute_harness(ArbitrageConfig {
            auto_execute: true,
            ..sample_config()
        });
        quote(&h.book, "binance", dec!(99.9), dec!(100));
        quote(&h.book, "coinbase", dec!(101), dec!(101.1));

        h.detector.analyze_pair(&pair()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let opportunities = h.store.all();
        assert_eq!(opportunities.len(), 1);
        assert_eq!(executor.calls(), vec![opportunities[0].id]);
    }

    #[tokio::test]
    async fn test_auto_execute_respects_min_profit() {
        let (h, executor) = auto_execute_harness(ArbitrageConfig {
            auto_execute: true,
            min_profit_pct: dec!(2),
            ..sample_config()
        });
        quote(&h.book, "binance", dec!(99.9), dec!(100));
        quote(&h.book, "coinbase", dec!(101), dec!(101.1));

        h.detector.analyze_pair(&pair()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Detected and stored, but 0.8% is below the 2% execution bar.
        assert_eq!(h.store.len(), 1);
        assert!(executor.calls().is_empty());
    }
}
