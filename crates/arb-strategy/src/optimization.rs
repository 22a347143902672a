//! Advice shape returned by an external execution optimizer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::plan::ExecutionApproach;

/// Leg scheduling advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingAdvice {
    /// Submit the buy leg first under sequential execution.
    pub buy_first: bool,
    /// Recommended pause between retry attempts.
    pub max_delay_ms: u64,
}

/// Recommendation produced by an optimization advisor for one
/// opportunity, folded into the plan before legs are submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    /// Size the advisor considers fillable right now.
    pub optimized_size: Decimal,
    pub execution_approach: ExecutionApproach,
    pub timing: TimingAdvice,
    /// Advisor confidence in [0, 1].
    pub confidence: Decimal,
}
