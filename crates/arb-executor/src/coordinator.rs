//! Execution coordination.
//!
//! Owns the full lifecycle of one execution attempt: admission against
//! the concurrency cap, planning, optional external optimization,
//! profitability validation, leg placement, and settlement of the
//! opportunity record. Every exit path releases the admission slot and
//! the executing-set entry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashSet;
use rust_decimal::Decimal;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use arb_core::{
    ArbEvent, EventBus, ExchangeId, FeeBreakdown, MarketKey, Opportunity, OpportunityStatus,
    OpportunityStore, SharedConfig, SharedOpportunity,
};
use arb_feed::PriceBook;
use arb_registry::MarketRegistry;
use arb_strategy::{
    apply_external_optimization, execution_degradation, generate_execution_plan, live_profit_pct,
    should_abort_execution, validate_profitability, ExecutionApproach, ExecutionPlan, LegOrder,
    LiveQuote, OptimizationRecommendation,
};

use crate::error::{ExecutorError, ExecutorResult};
use crate::legs::{BoxFuture, DynLegExecutor, LegFill, LegRequest, LegSide};
use crate::optimizer::{DynOptimizationAdvisor, OptimizationContext};
use crate::slots::ExecutionSlots;
use crate::stats::{ExecutionStats, StatsReport};

/// Bound on the optional optimization call.
const OPTIMIZER_TIMEOUT_MS: u64 = 2_000;

/// Anything able to run a stored opportunity by id.
///
/// The detector's auto-execution path holds this seam instead of the
/// concrete coordinator.
pub trait OpportunityExecutor: Send + Sync {
    /// Returns true only when the execution completed successfully.
    fn execute_opportunity(&self, id: Uuid) -> BoxFuture<'_, bool>;
}

/// Arc wrapper for OpportunityExecutor trait objects.
pub type DynOpportunityExecutor = Arc<dyn OpportunityExecutor>;

pub struct ExecutionCoordinator {
    store: Arc<OpportunityStore>,
    registry: Arc<MarketRegistry>,
    book: Arc<PriceBook>,
    config: SharedConfig,
    bus: EventBus,
    legs: DynLegExecutor,
    advisor: Option<DynOptimizationAdvisor>,
    slots: ExecutionSlots,
    executing: DashSet<Uuid>,
    stats: Arc<ExecutionStats>,
}

impl ExecutionCoordinator {
    pub fn new(
        store: Arc<OpportunityStore>,
        registry: Arc<MarketRegistry>,
        book: Arc<PriceBook>,
        config: SharedConfig,
        bus: EventBus,
        legs: DynLegExecutor,
    ) -> Self {
        Self {
            store,
            registry,
            book,
            config,
            bus,
            legs,
            advisor: None,
            slots: ExecutionSlots::new(),
            executing: DashSet::new(),
            stats: Arc::new(ExecutionStats::new()),
        }
    }

    /// Attach an optimization advisor.
    pub fn with_advisor(mut self, advisor: DynOptimizationAdvisor) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Counter handle shared with the detector.
    pub fn stats_handle(&self) -> Arc<ExecutionStats> {
        self.stats.clone()
    }

    pub fn is_executing(&self, id: &Uuid) -> bool {
        self.executing.contains(id)
    }

    pub fn executing_count(&self) -> usize {
        self.slots.in_use()
    }

    /// Point-in-time run report.
    pub fn stats(&self) -> StatsReport {
        StatsReport {
            analysis_count: self.stats.analyses(),
            opportunities_detected: self.stats.detected(),
            opportunities_executed: self.stats.executed(),
            executions_failed: self.stats.failed(),
            total_profit: self.stats.total_profit(),
            average_profit: self.stats.average_profit(),
            active_opportunities: self.store.count_by_status(OpportunityStatus::Detected),
            executing_count: self.slots.in_use(),
        }
    }

    /// Execute a stored opportunity end to end.
    ///
    /// Returns false without any state change when the id is unknown,
    /// the opportunity is not in DETECTED state, or the concurrency cap
    /// is reached. Otherwise the opportunity ends in EXECUTED (true) or
    /// FAILED (false).
    pub async fn execute_opportunity(&self, id: Uuid) -> bool {
        let Some(shared) = self.store.get(&id) else {
            warn!(%id, "Cannot execute unknown opportunity");
            return false;
        };

        let limit = self.config.read().max_concurrent_trades;
        let Some(_slot) = self.slots.try_acquire(limit) else {
            debug!(%id, limit, "Concurrency cap reached, rejecting execution");
            return false;
        };

        {
            let mut opp = shared.write();
            if opp.status != OpportunityStatus::Detected {
                debug!(%id, status = %opp.status, "Opportunity not executable");
                return false;
            }
            if let Err(e) = opp.begin_execution() {
                warn!(%id, error = %e, "Failed to begin execution");
                return false;
            }
        }
        self.executing.insert(id);

        let started = Instant::now();
        let snapshot = shared.read().clone();
        info!(
            %id,
            pair = %snapshot.pair,
            buy = %snapshot.buy_exchange,
            sell = %snapshot.sell_exchange,
            profit_pct = %snapshot.profit_pct,
            "Executing opportunity"
        );
        self.bus.emit(ArbEvent::ExecutionStarted(snapshot.clone()));

        let success = match self.run_pipeline(&snapshot).await {
            Ok((plan, buy_fill, sell_fill)) => {
                self.settle_success(&shared, &plan, buy_fill, sell_fill, started)
            }
            Err(e) => {
                warn!(%id, error = %e, "Execution failed");
                self.settle_failure(&shared, e.to_string());
                false
            }
        };

        self.executing.remove(&id);
        success
    }

    /// Plan, optimize, validate, and run the legs.
    async fn run_pipeline(
        &self,
        opportunity: &Opportunity,
    ) -> ExecutorResult<(ExecutionPlan, LegFill, LegFill)> {
        let mut plan = generate_execution_plan(opportunity);
        debug!(
            id = %opportunity.id,
            strategy = %plan.strategy,
            size = %plan.size,
            approach = ?plan.approach,
            "Execution plan"
        );

        if let Some(rec) = self.optimization(opportunity).await {
            apply_external_optimization(&mut plan, Some(&rec));
            debug!(
                id = %opportunity.id,
                size = %plan.size,
                approach = ?plan.approach,
                "Plan adjusted by optimizer"
            );
        }

        if !validate_profitability(opportunity, &plan) {
            return Err(ExecutorError::UnprofitablePlan {
                tolerance_pct: plan.slippage_tolerance_pct,
            });
        }

        let leg_deadline = plan
            .timeout_ms
            .min(self.config.read().max_execution_time_ms);
        let (buy_fill, sell_fill) = timeout(
            Duration::from_millis(leg_deadline),
            self.run_legs(opportunity, &plan),
        )
        .await
        .map_err(|_| ExecutorError::Timeout(leg_deadline))??;

        Ok((plan, buy_fill, sell_fill))
    }

    /// Bounded advisory call; any failure means "no recommendation."
    async fn optimization(&self, opportunity: &Opportunity) -> Option<OptimizationRecommendation> {
        let advisor = self.advisor.as_ref()?;
        let buy_exchange = self.registry.exchange(&opportunity.buy_exchange)?;
        let sell_exchange = self.registry.exchange(&opportunity.sell_exchange)?;

        let context = OptimizationContext {
            opportunity: opportunity.clone(),
            buy_exchange,
            sell_exchange,
            buy_snapshot: self.snapshot_for(opportunity, LegSide::Buy),
            sell_snapshot: self.snapshot_for(opportunity, LegSide::Sell),
        };

        match timeout(
            Duration::from_millis(OPTIMIZER_TIMEOUT_MS),
            advisor.recommend(context),
        )
        .await
        {
            Ok(Ok(rec)) => Some(rec),
            Ok(Err(e)) => {
                warn!(id = %opportunity.id, error = %e, "Optimizer failed, using default plan");
                None
            }
            Err(_) => {
                warn!(id = %opportunity.id, "Optimizer timed out, using default plan");
                None
            }
        }
    }

    async fn run_legs(
        &self,
        opportunity: &Opportunity,
        plan: &ExecutionPlan,
    ) -> ExecutorResult<(LegFill, LegFill)> {
        let buy = self.leg_request(LegSide::Buy, opportunity, plan.size);
        let sell = self.leg_request(LegSide::Sell, opportunity, plan.size);

        match plan.approach {
            ExecutionApproach::Parallel => {
                let (buy_fill, sell_fill) = tokio::join!(
                    self.leg_with_retries(buy, plan),
                    self.leg_with_retries(sell, plan),
                );
                Ok((buy_fill?, sell_fill?))
            }
            ExecutionApproach::Sequential => {
                let (first, second) = match plan.leg_order {
                    LegOrder::BuyFirst => (buy, sell),
                    LegOrder::SellFirst => (sell, buy),
                };
                let first_fill = self.leg_with_retries(first, plan).await?;
                self.check_degradation(opportunity, plan)?;
                let second_fill = self.leg_with_retries(second, plan).await?;
                match plan.leg_order {
                    LegOrder::BuyFirst => Ok((first_fill, second_fill)),
                    LegOrder::SellFirst => Ok((second_fill, first_fill)),
                }
            }
        }
    }

    async fn leg_with_retries(
        &self,
        request: LegRequest,
        plan: &ExecutionPlan,
    ) -> ExecutorResult<LegFill> {
        let attempts = plan.max_retries.saturating_add(1);
        let mut last_error: Option<ExecutorError> = None;

        for attempt in 1..=attempts {
            match self.legs.execute(request.clone()).await {
                Ok(fill) => {
                    if attempt > 1 {
                        debug!(side = %request.side, attempt, "Leg filled after retry");
                    }
                    return Ok(fill);
                }
                Err(e) => {
                    debug!(side = %request.side, attempt, error = %e, "Leg attempt failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(plan.retry_delay_ms)).await;
                    }
                }
            }
        }

        Err(ExecutorError::LegFailed {
            side: request.side,
            attempts,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// Between sequential legs: abort when the live edge has degraded
    /// past the plan threshold. Missing or invalid live data skips the
    /// check rather than aborting.
    fn check_degradation(
        &self,
        opportunity: &Opportunity,
        plan: &ExecutionPlan,
    ) -> ExecutorResult<()> {
        let Some(live) = self.live_quote(opportunity) else {
            return Ok(());
        };
        if should_abort_execution(opportunity, plan, &live) {
            return Err(ExecutorError::DegradationAbort {
                degradation: execution_degradation(opportunity.profit_pct, live_profit_pct(&live)),
                threshold: plan.abort_threshold,
            });
        }
        Ok(())
    }

    fn live_quote(&self, opportunity: &Opportunity) -> Option<LiveQuote> {
        let buy = self.snapshot_for(opportunity, LegSide::Buy)?;
        let sell = self.snapshot_for(opportunity, LegSide::Sell)?;
        if !buy.is_valid() || !sell.is_valid() {
            return None;
        }
        Some(LiveQuote {
            buy_ask: buy.ask,
            sell_bid: sell.bid,
            buy_fee_rate: self.fee_rate(&opportunity.buy_exchange),
            sell_fee_rate: self.fee_rate(&opportunity.sell_exchange),
        })
    }

    fn snapshot_for(
        &self,
        opportunity: &Opportunity,
        side: LegSide,
    ) -> Option<arb_core::PriceSnapshot> {
        let exchange = match side {
            LegSide::Buy => &opportunity.buy_exchange,
            LegSide::Sell => &opportunity.sell_exchange,
        };
        self.book
            .get(&MarketKey::new(exchange.clone(), opportunity.pair.clone()))
    }

    fn leg_request(&self, side: LegSide, opportunity: &Opportunity, size: Decimal) -> LegRequest {
        let (exchange, price) = match side {
            LegSide::Buy => (opportunity.buy_exchange.clone(), opportunity.buy_price),
            LegSide::Sell => (opportunity.sell_exchange.clone(), opportunity.sell_price),
        };
        let fee_rate = self.fee_rate(&exchange);
        LegRequest {
            side,
            exchange,
            pair: opportunity.pair.clone(),
            price,
            size,
            fee_rate,
        }
    }

    /// Registry taker fee, defaulting to 0.1% for unknown venues.
    fn fee_rate(&self, exchange: &ExchangeId) -> Decimal {
        self.registry
            .fee_rate(exchange)
            .unwrap_or_else(|| Decimal::new(1, 3))
    }

    fn settle_success(
        &self,
        shared: &SharedOpportunity,
        plan: &ExecutionPlan,
        buy_fill: LegFill,
        sell_fill: LegFill,
        started: Instant,
    ) -> bool {
        let fees = FeeBreakdown::new(buy_fill.fee, sell_fill.fee);
        let completed = {
            let mut opp = shared.write();
            if let Err(e) =
                opp.complete_execution(buy_fill.price, sell_fill.price, plan.size, fees)
            {
                warn!(id = %opp.id, error = %e, "Completion transition failed");
                None
            } else {
                Some(opp.clone())
            }
        };
        let Some(completed) = completed else {
            self.settle_failure(shared, "completion transition failed".to_string());
            return false;
        };

        let profit = completed
            .execution
            .as_ref()
            .map(|details| details.actual_profit)
            .unwrap_or_default();
        self.stats.record_success(profit);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let slow_after = self.config.read().notification_thresholds.execution_time_ms;
        if elapsed_ms > slow_after {
            warn!(
                id = %completed.id,
                elapsed_ms,
                profit = %profit,
                "Execution completed slowly"
            );
        } else {
            info!(
                id = %completed.id,
                elapsed_ms,
                profit = %profit,
                "Execution completed"
            );
        }
        self.bus.emit(ArbEvent::ExecutionCompleted(completed));
        true
    }

    fn settle_failure(&self, shared: &SharedOpportunity, error: String) {
        {
            let mut opp = shared.write();
            if let Err(e) = opp.fail_execution(error.clone()) {
                warn!(id = %opp.id, error = %e, "Failure transition failed");
            }
        }
        self.stats.record_failure();
        self.bus.emit(ArbEvent::ExecutionFailed {
            opportunity: shared.read().clone(),
            error,
        });
    }
}

impl OpportunityExecutor for ExecutionCoordinator {
    fn execute_opportunity(&self, id: Uuid) -> BoxFuture<'_, bool> {
        Box::pin(ExecutionCoordinator::execute_opportunity(self, id))
    }
}
