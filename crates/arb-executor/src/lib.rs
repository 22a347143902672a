//! Trade execution for detected arbitrage opportunities.
//!
//! The [`ExecutionCoordinator`] admits opportunities against a
//! hot-updatable concurrency cap, plans them through `arb-strategy`,
//! and places both legs through a pluggable [`LegExecutor`]. The
//! bundled [`SimulatedLegExecutor`] models fill slippage and venue
//! rejections for paper trading; live venue connectors implement the
//! same trait.

pub mod coordinator;
pub mod error;
pub mod legs;
pub mod optimizer;
pub mod slots;
pub mod stats;

pub use coordinator::{DynOpportunityExecutor, ExecutionCoordinator, OpportunityExecutor};
pub use error::{ExecutorError, ExecutorResult};
pub use legs::{
    BoxFuture, DynLegExecutor, LegExecutor, LegFill, LegRequest, LegSide, MockLegExecutor,
    SimulatedLegExecutor,
};
pub use optimizer::{
    DynOptimizationAdvisor, MockOptimizationAdvisor, OptimizationAdvisor, OptimizationContext,
};
pub use slots::{ExecutionSlots, SlotGuard};
pub use stats::{ExecutionStats, StatsReport};
