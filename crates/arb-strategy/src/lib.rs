//! Execution strategy selection.
//!
//! Maps a detected opportunity to a concrete [`ExecutionPlan`]:
//! archetype choice, confidence- and profit-scaled sizing,
//! slippage-adjusted profitability validation, and the live
//! degradation rule that aborts a plan mid-flight. All functions are
//! pure; the executor supplies live data and owns the clock.

pub mod optimization;
pub mod plan;
pub mod selector;

pub use optimization::{OptimizationRecommendation, TimingAdvice};
pub use plan::{ExecutionApproach, ExecutionPlan, LegOrder, StrategyType};
pub use selector::{
    apply_external_optimization, determine_strategy, execution_degradation,
    expected_execution_prices, generate_execution_plan, live_profit_pct, plan_with_strategy,
    should_abort_execution, validate_profitability, ExpectedPrices, LiveQuote,
};
