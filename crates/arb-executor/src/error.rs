//! Executor error types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::legs::LegSide;

/// Errors surfaced by the execution pipeline. The coordinator folds
/// them into the opportunity's failure record; admission rejections
/// never produce an error, only a `false` return.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("venue error: {0}")]
    Venue(String),

    #[error("{side} leg failed after {attempts} attempts: {reason}")]
    LegFailed {
        side: LegSide,
        attempts: u32,
        reason: String,
    },

    #[error("aborted between legs: degradation {degradation} exceeded threshold {threshold}")]
    DegradationAbort {
        degradation: Decimal,
        threshold: Decimal,
    },

    #[error("plan unprofitable at {tolerance_pct}% slippage tolerance")]
    UnprofitablePlan { tolerance_pct: Decimal },

    #[error("execution timed out after {0}ms")]
    Timeout(u64),

    #[error("optimizer error: {0}")]
    Optimizer(String),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
