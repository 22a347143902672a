//! Typed engine events.
//!
//! Components publish through an [`EventBus`] backed by a broadcast
//! channel. Delivery order follows publish order; a bus with no
//! subscribers silently drops events.

use tokio::sync::broadcast;

use crate::market::ExchangeId;
use crate::opportunity::Opportunity;

/// Engine notification, carrying a snapshot of the opportunity at the
/// moment of publishing.
#[derive(Debug, Clone)]
pub enum ArbEvent {
    /// Detector found a profitable discrepancy.
    OpportunityDetected(Opportunity),
    /// Detection whose profit crossed the notification threshold.
    HighProfitOpportunity(Opportunity),
    /// Coordinator admitted the opportunity for execution.
    ExecutionStarted(Opportunity),
    /// Both legs completed; execution details attached.
    ExecutionCompleted(Opportunity),
    /// Execution failed; the opportunity carries the error as well.
    ExecutionFailed {
        opportunity: Opportunity,
        error: String,
    },
    /// A feed gave up reconnecting after exhausting its attempts.
    MaxReconnectAttemptsReached { exchange: ExchangeId },
}

impl ArbEvent {
    /// Stable label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpportunityDetected(_) => "opportunity_detected",
            Self::HighProfitOpportunity(_) => "high_profit_opportunity",
            Self::ExecutionStarted(_) => "execution_started",
            Self::ExecutionCompleted(_) => "execution_completed",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::MaxReconnectAttemptsReached { .. } => "max_reconnect_attempts_reached",
        }
    }
}

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Clonable publish/subscribe handle shared by every component.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ArbEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Open a new receiver. Slow receivers lag and skip, they never
    /// block publishers.
    pub fn subscribe(&self) -> broadcast::Receiver<ArbEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. A send error only means nobody is listening.
    pub fn emit(&self, event: ArbEvent) {
        let _ = self.tx.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
