//! Strategy selection and plan construction.
//!
//! Everything here is a pure function of the opportunity and plan
//! passed in; the executor owns all state and timing.

use arb_core::{direction_profit, Opportunity};
use rust_decimal::Decimal;

use crate::optimization::OptimizationRecommendation;
use crate::plan::{ExecutionPlan, LegOrder, StrategyType};

/// Fee rate assumed per leg when validating a plan (0.1%).
fn validation_fee_rate() -> Decimal {
    Decimal::new(1, 3)
}

/// Pick the archetype for an opportunity. First matching rule wins:
/// profit above 3% goes aggressive, a sub-second execution window goes
/// speed, confidence above 0.8 goes balanced, anything else is
/// conservative.
pub fn determine_strategy(opportunity: &Opportunity) -> StrategyType {
    if opportunity.profit_pct > Decimal::from(3) {
        StrategyType::Aggressive
    } else if opportunity.estimated_execution_time_ms < 1000 {
        StrategyType::Speed
    } else if opportunity.confidence > Decimal::new(8, 1) {
        StrategyType::Balanced
    } else {
        StrategyType::Conservative
    }
}

/// Build the full plan for an opportunity, choosing the archetype via
/// [`determine_strategy`].
pub fn generate_execution_plan(opportunity: &Opportunity) -> ExecutionPlan {
    plan_with_strategy(opportunity, determine_strategy(opportunity))
}

/// Build a plan under an explicitly chosen archetype.
pub fn plan_with_strategy(opportunity: &Opportunity, strategy: StrategyType) -> ExecutionPlan {
    let mut plan = strategy.base_plan();
    plan.size = scaled_size(opportunity, strategy.size_fraction());
    plan
}

/// `fraction * max_size * confidence * min(1, 0.5 + profit_pct / 10)`,
/// truncated to three decimal places.
fn scaled_size(opportunity: &Opportunity, fraction: Decimal) -> Decimal {
    let profit_boost = (Decimal::new(5, 1) + opportunity.profit_pct / Decimal::from(10))
        .min(Decimal::ONE);
    (fraction * opportunity.max_size * opportunity.confidence * profit_boost)
        .trunc_with_scale(3)
}

/// Worst fill prices the plan tolerates per leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedPrices {
    /// Buy fill at full adverse slippage.
    pub buy: Decimal,
    /// Sell fill at full adverse slippage.
    pub sell: Decimal,
}

/// Shift the detected prices to the edge of the plan's slippage
/// tolerance: buy up, sell down.
pub fn expected_execution_prices(
    opportunity: &Opportunity,
    plan: &ExecutionPlan,
) -> ExpectedPrices {
    let tolerance = plan.slippage_tolerance_pct / Decimal::from(100);
    ExpectedPrices {
        buy: opportunity.buy_price * (Decimal::ONE + tolerance),
        sell: opportunity.sell_price * (Decimal::ONE - tolerance),
    }
}

/// Re-run the profit math at the worst tolerated prices, charging 0.1%
/// per leg. A plan that cannot clear zero here is not worth sending to
/// the legs.
pub fn validate_profitability(opportunity: &Opportunity, plan: &ExecutionPlan) -> bool {
    let prices = expected_execution_prices(opportunity, plan);
    let fee = validation_fee_rate();
    direction_profit(prices.buy, prices.sell, fee, fee).is_profitable()
}

/// Live bid/ask and fee context for the mid-execution abort check.
#[derive(Debug, Clone, Copy)]
pub struct LiveQuote {
    /// Current ask on the buy exchange.
    pub buy_ask: Decimal,
    /// Current bid on the sell exchange.
    pub sell_bid: Decimal,
    pub buy_fee_rate: Decimal,
    pub sell_fee_rate: Decimal,
}

/// Net profit percentage the quote offers right now.
pub fn live_profit_pct(live: &LiveQuote) -> Decimal {
    direction_profit(
        live.buy_ask,
        live.sell_bid,
        live.buy_fee_rate,
        live.sell_fee_rate,
    )
    .pct
}

/// Fraction of the originally detected edge that has evaporated.
///
/// Returns 1 when either side is non-positive. A live edge at or above
/// the original yields zero or a negative value, which never trips any
/// abort threshold.
pub fn execution_degradation(original_pct: Decimal, live_pct: Decimal) -> Decimal {
    if original_pct <= Decimal::ZERO || live_pct <= Decimal::ZERO {
        return Decimal::ONE;
    }
    Decimal::ONE - live_pct / original_pct
}

/// True when live prices have degraded past the plan's threshold.
pub fn should_abort_execution(
    opportunity: &Opportunity,
    plan: &ExecutionPlan,
    live: &LiveQuote,
) -> bool {
    execution_degradation(opportunity.profit_pct, live_profit_pct(live)) > plan.abort_threshold
}

/// Fold an advisor recommendation into the plan. `None` leaves the
/// plan untouched.
///
/// Size, approach, leg order, and retry delay come straight from the
/// recommendation; the abort threshold is raised by
/// `(1 - confidence) * 0.2`, capped at 0.9.
pub fn apply_external_optimization(
    plan: &mut ExecutionPlan,
    recommendation: Option<&OptimizationRecommendation>,
) {
    let Some(rec) = recommendation else {
        return;
    };
    plan.size = rec.optimized_size;
    plan.approach = rec.execution_approach;
    plan.leg_order = if rec.timing.buy_first {
        LegOrder::BuyFirst
    } else {
        LegOrder::SellFirst
    };
    plan.retry_delay_ms = rec.timing.max_delay_ms;
    let nudge = (Decimal::ONE - rec.confidence) * Decimal::new(2, 1);
    plan.abort_threshold = (plan.abort_threshold + nudge).min(Decimal::new(9, 1));
}
