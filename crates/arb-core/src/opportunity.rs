//! Opportunity lifecycle types.
//!
//! An [`Opportunity`] is created once by the detector and afterwards
//! mutated only by the execution coordinator. The status machine is
//! DETECTED -> EXECUTING -> {EXECUTED, FAILED}, with IGNORED as a
//! terminal administrative state that is never set automatically.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::market::{ExchangeId, PairId};

/// Lifecycle state of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityStatus {
    /// Detected and waiting for an execution decision.
    #[default]
    Detected,
    /// Execution in progress, counted against the concurrency cap.
    Executing,
    /// Both legs completed.
    Executed,
    /// Execution attempted and failed.
    Failed,
    /// Dismissed by an operator; never set automatically.
    Ignored,
}

impl OpportunityStatus {
    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Failed | Self::Ignored)
    }

    /// Check whether a transition to `next` is allowed.
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Detected, Self::Executing)
                | (Self::Executing, Self::Executed)
                | (Self::Executing, Self::Failed)
                | (Self::Detected, Self::Ignored)
        )
    }
}

impl std::fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detected => write!(f, "DETECTED"),
            Self::Executing => write!(f, "EXECUTING"),
            Self::Executed => write!(f, "EXECUTED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Ignored => write!(f, "IGNORED"),
        }
    }
}

/// Absolute fees paid on each leg, in quote units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub buy_fee: Decimal,
    pub sell_fee: Decimal,
}

impl FeeBreakdown {
    pub fn new(buy_fee: Decimal, sell_fee: Decimal) -> Self {
        Self { buy_fee, sell_fee }
    }

    pub fn total(&self) -> Decimal {
        self.buy_fee + self.sell_fee
    }
}

/// Record of one execution attempt, attached when the opportunity
/// enters EXECUTING.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDetails {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub success: bool,
    /// Realized buy-leg price.
    pub buy_fill_price: Decimal,
    /// Realized sell-leg price.
    pub sell_fill_price: Decimal,
    /// Base units actually traded.
    pub executed_size: Decimal,
    pub fees: FeeBreakdown,
    /// Net profit in quote units after fees.
    pub actual_profit: Decimal,
    /// Net profit as a percentage of the buy-leg cost.
    pub actual_profit_pct: Decimal,
    pub error: Option<String>,
}

impl ExecutionDetails {
    /// Open a fresh record with the start timestamp set to now.
    pub fn begin() -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: None,
            success: false,
            buy_fill_price: Decimal::ZERO,
            sell_fill_price: Decimal::ZERO,
            executed_size: Decimal::ZERO,
            fees: FeeBreakdown::default(),
            actual_profit: Decimal::ZERO,
            actual_profit_pct: Decimal::ZERO,
            error: None,
        }
    }

    /// Close the record as successful, deriving realized profit from
    /// fill prices, size, and absolute fees.
    pub fn complete(&mut self, buy_fill: Decimal, sell_fill: Decimal, size: Decimal, fees: FeeBreakdown) {
        let cost = buy_fill * size;
        let net = (sell_fill - buy_fill) * size - fees.total();
        self.buy_fill_price = buy_fill;
        self.sell_fill_price = sell_fill;
        self.executed_size = size;
        self.fees = fees;
        self.actual_profit = net;
        self.actual_profit_pct = if cost > Decimal::ZERO {
            net / cost * Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        self.success = true;
        self.completed_at = Some(Utc::now());
    }

    /// Close the record as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.success = false;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Wall time of the attempt in milliseconds, if it has completed.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// Net economics of one arbitrage direction: buy at `ask` on one
/// venue, sell at `bid` on another, taker fees on both legs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionProfit {
    /// Per-unit cost of the buy leg including its fee.
    pub buy_total: Decimal,
    /// Per-unit proceeds of the sell leg net of its fee.
    pub sell_total: Decimal,
    /// `sell_total - buy_total`.
    pub per_unit: Decimal,
    /// `per_unit / buy_total * 100`; zero when the buy leg costs nothing.
    pub pct: Decimal,
}

impl DirectionProfit {
    pub fn is_profitable(&self) -> bool {
        self.pct > Decimal::ZERO
    }
}

/// Evaluate one direction's profitability after fees.
///
/// Fee rates are fractions (0.001 = 0.1%). The math is deliberately
/// asymmetric between the legs, so the reverse direction must be
/// evaluated separately.
pub fn direction_profit(
    ask: Decimal,
    bid: Decimal,
    buy_fee_rate: Decimal,
    sell_fee_rate: Decimal,
) -> DirectionProfit {
    let buy_total = ask * (Decimal::ONE + buy_fee_rate);
    let sell_total = bid * (Decimal::ONE - sell_fee_rate);
    let per_unit = sell_total - buy_total;
    let pct = if buy_total > Decimal::ZERO {
        per_unit / buy_total * Decimal::from(100)
    } else {
        Decimal::ZERO
    };
    DirectionProfit {
        buy_total,
        sell_total,
        per_unit,
        pct,
    }
}

/// A detected cross-exchange price discrepancy.
///
/// `buy_price` is the ask on the buy exchange and `sell_price` the bid
/// on the sell exchange. Profit figures are net of taker fees on both
/// legs; `spread_pct` is the gross spread before fees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub pair: PairId,
    pub buy_exchange: ExchangeId,
    pub sell_exchange: ExchangeId,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub spread_pct: Decimal,
    pub profit_per_unit: Decimal,
    pub profit_pct: Decimal,
    /// Depth-derived executable size in base units.
    pub max_size: Decimal,
    /// Confidence score in [0, 1].
    pub confidence: Decimal,
    pub estimated_execution_time_ms: u64,
    pub detected_at: DateTime<Utc>,
    pub status: OpportunityStatus,
    pub execution: Option<ExecutionDetails>,
}

impl Opportunity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pair: PairId,
        buy_exchange: ExchangeId,
        sell_exchange: ExchangeId,
        buy_price: Decimal,
        sell_price: Decimal,
        profit_per_unit: Decimal,
        profit_pct: Decimal,
        max_size: Decimal,
        confidence: Decimal,
        estimated_execution_time_ms: u64,
    ) -> Self {
        let spread_pct = if buy_price > Decimal::ZERO {
            (sell_price - buy_price) / buy_price * Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        Self {
            id: Uuid::new_v4(),
            pair,
            buy_exchange,
            sell_exchange,
            buy_price,
            sell_price,
            spread_pct,
            profit_per_unit,
            profit_pct,
            max_size,
            confidence,
            estimated_execution_time_ms,
            detected_at: Utc::now(),
            status: OpportunityStatus::Detected,
            execution: None,
        }
    }

    /// DETECTED -> EXECUTING, opening the execution record.
    pub fn begin_execution(&mut self) -> Result<()> {
        self.transition_to(OpportunityStatus::Executing)?;
        self.execution = Some(ExecutionDetails::begin());
        Ok(())
    }

    /// EXECUTING -> EXECUTED with realized fills.
    pub fn complete_execution(
        &mut self,
        buy_fill: Decimal,
        sell_fill: Decimal,
        size: Decimal,
        fees: FeeBreakdown,
    ) -> Result<()> {
        self.transition_to(OpportunityStatus::Executed)?;
        self.execution
            .get_or_insert_with(ExecutionDetails::begin)
            .complete(buy_fill, sell_fill, size, fees);
        Ok(())
    }

    /// EXECUTING -> FAILED with the leg error captured.
    pub fn fail_execution(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition_to(OpportunityStatus::Failed)?;
        self.execution
            .get_or_insert_with(ExecutionDetails::begin)
            .fail(error);
        Ok(())
    }

    /// DETECTED -> IGNORED, operator action only.
    pub fn mark_ignored(&mut self) -> Result<()> {
        self.transition_to(OpportunityStatus::Ignored)
    }

    fn transition_to(&mut self, next: OpportunityStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Age since detection in milliseconds.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.detected_at).num_milliseconds()
    }
}
