//! Execution plans and the strategy archetypes they are built from.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Strategy archetype an opportunity is executed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyType {
    /// Large commitment, parallel legs, loose slippage.
    Aggressive,
    /// Small commitment, short deadline, single retry.
    Speed,
    /// Moderate commitment, sequential legs.
    Balanced,
    /// Smallest commitment, tight slippage, patient retries.
    Conservative,
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Aggressive => "aggressive",
            Self::Speed => "speed",
            Self::Balanced => "balanced",
            Self::Conservative => "conservative",
        };
        write!(f, "{s}")
    }
}

/// How the buy and sell legs are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionApproach {
    /// Both legs submitted concurrently.
    Parallel,
    /// Legs submitted one after the other in `leg_order`.
    Sequential,
}

/// Which leg goes first under sequential execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegOrder {
    BuyFirst,
    SellFirst,
}

/// Concrete execution profile for a single opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub strategy: StrategyType,
    /// Base-asset quantity to trade on both legs.
    pub size: Decimal,
    pub approach: ExecutionApproach,
    /// Ignored when `approach` is parallel.
    pub leg_order: LegOrder,
    /// Tolerated adverse price move per leg, in percent.
    pub slippage_tolerance_pct: Decimal,
    /// Deadline for the leg phase of this plan.
    pub timeout_ms: u64,
    /// Retries allowed per leg after the first attempt.
    pub max_retries: u32,
    /// Pause between retry attempts.
    pub retry_delay_ms: u64,
    /// Abort mid-execution once live degradation exceeds this fraction.
    pub abort_threshold: Decimal,
    /// Whether the plan may be adjusted while legs are in flight.
    pub adaptive: bool,
}

impl StrategyType {
    /// Fraction of an opportunity's max size this archetype commits.
    pub fn size_fraction(&self) -> Decimal {
        match self {
            Self::Aggressive => Decimal::new(95, 2),
            Self::Speed => Decimal::new(60, 2),
            Self::Balanced => Decimal::new(80, 2),
            Self::Conservative => Decimal::new(50, 2),
        }
    }

    /// Fixed profile for this archetype. `size` is left at zero; the
    /// selector fills it in from the opportunity.
    pub fn base_plan(&self) -> ExecutionPlan {
        match self {
            Self::Aggressive => ExecutionPlan {
                strategy: *self,
                size: Decimal::ZERO,
                approach: ExecutionApproach::Parallel,
                leg_order: LegOrder::BuyFirst,
                slippage_tolerance_pct: Decimal::ONE,
                timeout_ms: 10_000,
                max_retries: 3,
                retry_delay_ms: 100,
                abort_threshold: Decimal::new(5, 1),
                adaptive: true,
            },
            Self::Speed => ExecutionPlan {
                strategy: *self,
                size: Decimal::ZERO,
                approach: ExecutionApproach::Parallel,
                leg_order: LegOrder::BuyFirst,
                slippage_tolerance_pct: Decimal::new(75, 2),
                timeout_ms: 5_000,
                max_retries: 1,
                retry_delay_ms: 50,
                abort_threshold: Decimal::new(7, 1),
                adaptive: true,
            },
            Self::Balanced => ExecutionPlan {
                strategy: *self,
                size: Decimal::ZERO,
                approach: ExecutionApproach::Sequential,
                leg_order: LegOrder::BuyFirst,
                slippage_tolerance_pct: Decimal::new(5, 1),
                timeout_ms: 10_000,
                max_retries: 2,
                retry_delay_ms: 200,
                abort_threshold: Decimal::new(6, 1),
                adaptive: true,
            },
            Self::Conservative => ExecutionPlan {
                strategy: *self,
                size: Decimal::ZERO,
                approach: ExecutionApproach::Sequential,
                leg_order: LegOrder::BuyFirst,
                slippage_tolerance_pct: Decimal::new(3, 1),
                timeout_ms: 15_000,
                max_retries: 3,
                retry_delay_ms: 500,
                abort_threshold: Decimal::new(8, 1),
                adaptive: false,
            },
        }
    }
}
