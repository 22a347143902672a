//! Leg placement seam and the bundled simulator.
//!
//! The coordinator talks to venues through [`LegExecutor`] so tests and
//! dry runs can swap the transport. [`SimulatedLegExecutor`] is the
//! bundled implementation: fills at the requested price plus a small
//! random adverse slippage, charging the venue's taker fee.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use arb_core::{ExchangeId, PairId};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::error::{ExecutorError, ExecutorResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Which side of the arbitrage a leg belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegSide {
    Buy,
    Sell,
}

impl fmt::Display for LegSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// One order leg to place on a venue.
#[derive(Debug, Clone)]
pub struct LegRequest {
    pub side: LegSide,
    pub exchange: ExchangeId,
    pub pair: PairId,
    /// Target price from the opportunity snapshot.
    pub price: Decimal,
    /// Base units to trade.
    pub size: Decimal,
    /// Venue taker fee as a fraction.
    pub fee_rate: Decimal,
}

/// Realized fill for one leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegFill {
    pub price: Decimal,
    pub size: Decimal,
    /// Absolute fee charged, in quote units.
    pub fee: Decimal,
}

/// Venue-facing order placement.
pub trait LegExecutor: Send + Sync {
    fn execute(&self, request: LegRequest) -> BoxFuture<'_, ExecutorResult<LegFill>>;
}

/// Arc wrapper for LegExecutor trait objects.
pub type DynLegExecutor = Arc<dyn LegExecutor>;

const DEFAULT_SUCCESS_RATE: f64 = 0.95;
const DEFAULT_MAX_SLIPPAGE_BPS: i64 = 10;

/// Fill simulator used when no real venue transport is wired.
///
/// Fills succeed with a fixed probability. A successful buy fills up to
/// `max_slippage_bps` above the requested price, a sell up to the same
/// amount below it; the fee is `fill_price * size * fee_rate`.
pub struct SimulatedLegExecutor {
    success_rate: f64,
    max_slippage_bps: i64,
    rng: Mutex<StdRng>,
}

impl SimulatedLegExecutor {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Deterministic variant for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            success_rate: DEFAULT_SUCCESS_RATE,
            max_slippage_bps: DEFAULT_MAX_SLIPPAGE_BPS,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Override the fill probability, `0.0..=1.0`.
    pub fn success_rate(mut self, rate: f64) -> Self {
        self.success_rate = rate;
        self
    }

    /// Override the worst-case adverse slippage in basis points.
    pub fn max_slippage_bps(mut self, bps: i64) -> Self {
        self.max_slippage_bps = bps;
        self
    }
}

impl Default for SimulatedLegExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LegExecutor for SimulatedLegExecutor {
    fn execute(&self, request: LegRequest) -> BoxFuture<'_, ExecutorResult<LegFill>> {
        Box::pin(async move {
            let (filled, slip_bps) = {
                let mut rng = self.rng.lock();
                (
                    rng.gen_bool(self.success_rate),
                    rng.gen_range(0..=self.max_slippage_bps),
                )
            };

            if !filled {
                return Err(ExecutorError::Venue(format!(
                    "simulated rejection on {}",
                    request.exchange
                )));
            }

            let slip = Decimal::new(slip_bps, 4);
            let fill_price = match request.side {
                LegSide::Buy => request.price * (Decimal::ONE + slip),
                LegSide::Sell => request.price * (Decimal::ONE - slip),
            };

            Ok(LegFill {
                price: fill_price,
                size: request.size,
                fee: fill_price * request.size * request.fee_rate,
            })
        })
    }
}

/// Scriptable leg executor for tests. Fills exactly at the requested
/// price unless told to fail.
#[derive(Debug, Default)]
pub struct MockLegExecutor {
    requests: Mutex<Vec<LegRequest>>,
    buy_failures: AtomicU32,
    sell_failures: AtomicU32,
    fail_all: AtomicBool,
    delay_ms: AtomicU64,
}

impl MockLegExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` buy legs before succeeding again.
    pub fn fail_next_buys(&self, n: u32) {
        self.buy_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` sell legs before succeeding again.
    pub fn fail_next_sells(&self, n: u32) {
        self.sell_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Delay every leg by `ms` before responding.
    pub fn set_delay_ms(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Recorded requests in arrival order.
    pub fn requests(&self) -> Vec<LegRequest> {
        self.requests.lock().clone()
    }
}

impl LegExecutor for MockLegExecutor {
    fn execute(&self, request: LegRequest) -> BoxFuture<'_, ExecutorResult<LegFill>> {
        Box::pin(async move {
            self.requests.lock().push(request.clone());

            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            if self.fail_all.load(Ordering::SeqCst) {
                return Err(ExecutorError::Venue("scripted failure".to_string()));
            }

            let remaining = match request.side {
                LegSide::Buy => &self.buy_failures,
                LegSide::Sell => &self.sell_failures,
            };
            let scripted_failure = remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if scripted_failure {
                return Err(ExecutorError::Venue("scripted failure".to_string()));
            }

            Ok(LegFill {
                price: request.price,
                size: request.size,
                fee: request.price * request.size * request.fee_rate,
            })
        })
    }
}
