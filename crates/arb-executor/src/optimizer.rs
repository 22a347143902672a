//! External optimization advisor seam.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arb_core::{Exchange, Opportunity, PriceSnapshot};
use arb_strategy::OptimizationRecommendation;
use parking_lot::Mutex;

use crate::error::{ExecutorError, ExecutorResult};
use crate::legs::BoxFuture;

/// Inputs handed to an advisor: the opportunity and the current view of
/// both venues.
#[derive(Debug, Clone)]
pub struct OptimizationContext {
    pub opportunity: Opportunity,
    pub buy_exchange: Arc<Exchange>,
    pub sell_exchange: Arc<Exchange>,
    pub buy_snapshot: Option<PriceSnapshot>,
    pub sell_snapshot: Option<PriceSnapshot>,
}

/// Optional execution-tuning collaborator.
///
/// The coordinator bounds every call with a timeout; an error or a
/// timeout means "no recommendation" and never fails the execution.
pub trait OptimizationAdvisor: Send + Sync {
    fn recommend(
        &self,
        context: OptimizationContext,
    ) -> BoxFuture<'_, ExecutorResult<OptimizationRecommendation>>;
}

/// Arc wrapper for OptimizationAdvisor trait objects.
pub type DynOptimizationAdvisor = Arc<dyn OptimizationAdvisor>;

/// Canned advisor for tests.
#[derive(Default)]
pub struct MockOptimizationAdvisor {
    recommendation: Mutex<Option<OptimizationRecommendation>>,
    delay_ms: AtomicU64,
    contexts: Mutex<Vec<OptimizationContext>>,
}

impl MockOptimizationAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recommendation to return; `None` makes the advisor error.
    pub fn set_recommendation(&self, recommendation: Option<OptimizationRecommendation>) {
        *self.recommendation.lock() = recommendation;
    }

    /// Delay before answering; lets tests exercise the caller's timeout.
    pub fn set_delay_ms(&self, delay: u64) {
        self.delay_ms.store(delay, Ordering::SeqCst);
    }

    /// Recorded contexts in arrival order.
    pub fn contexts(&self) -> Vec<OptimizationContext> {
        self.contexts.lock().clone()
    }
}

impl OptimizationAdvisor for MockOptimizationAdvisor {
    fn recommend(
        &self,
        context: OptimizationContext,
    ) -> BoxFuture<'_, ExecutorResult<OptimizationRecommendation>> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        Box::pin(async move {
            self.contexts.lock().push(context);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            self.recommendation
                .lock()
                .clone()
                .ok_or_else(|| ExecutorError::Optimizer("no recommendation scripted".to_string()))
        })
    }
}
