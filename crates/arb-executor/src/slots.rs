//! Admission control for concurrent executions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counter of in-flight executions.
///
/// Admission is a compare-and-swap loop: with one slot left, two
/// concurrent `try_acquire` calls cannot both succeed. The limit is
/// passed per call because `max_concurrent_trades` is hot-updatable.
#[derive(Debug, Default)]
pub struct ExecutionSlots {
    in_use: Arc<AtomicUsize>,
}

impl ExecutionSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots currently held.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Claim a slot, or None when `limit` are already held.
    pub fn try_acquire(&self, limit: usize) -> Option<SlotGuard> {
        let mut current = self.in_use.load(Ordering::Acquire);
        loop {
            if current >= limit {
                return None;
            }
            match self.in_use.compare_exchange(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(SlotGuard {
                        in_use: self.in_use.clone(),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }
}

/// Releases its slot when dropped.
#[derive(Debug)]
pub struct SlotGuard {
    in_use: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}
