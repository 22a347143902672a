//! In-memory opportunity store.
//!
//! Opportunities are kept for the lifetime of the process but the store
//! is bounded: once `capacity` is exceeded, the oldest entries are
//! evicted in insertion order, skipping any that are currently
//! EXECUTING. Entries are shared as `Arc<RwLock<_>>` so the coordinator
//! can mutate status in place while queries clone snapshots.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::opportunity::{Opportunity, OpportunityStatus};

/// Shared mutable handle to one stored opportunity.
pub type SharedOpportunity = Arc<RwLock<Opportunity>>;

const DEFAULT_CAPACITY: usize = 1000;

/// Bounded store of every opportunity the detector has emitted.
pub struct OpportunityStore {
    entries: DashMap<Uuid, SharedOpportunity>,
    /// Insertion order, oldest first. Drives both eviction and the
    /// ordering of [`OpportunityStore::all`].
    order: Mutex<VecDeque<Uuid>>,
    capacity: usize,
}

impl OpportunityStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Insert a freshly detected opportunity, evicting overflow.
    pub fn insert(&self, opportunity: Opportunity) -> SharedOpportunity {
        let id = opportunity.id;
        let shared: SharedOpportunity = Arc::new(RwLock::new(opportunity));
        self.entries.insert(id, shared.clone());

        let mut order = self.order.lock();
        order.push_back(id);
        self.evict_overflow(&mut order);
        shared
    }

    /// Oldest non-EXECUTING entries go first. If every entry is
    /// executing (cannot happen with a sane concurrency cap), nothing
    /// is evicted.
    fn evict_overflow(&self, order: &mut VecDeque<Uuid>) {
        while self.entries.len() > self.capacity {
            let position = order.iter().position(|id| {
                self.entries
                    .get(id)
                    .map(|entry| entry.read().status != OpportunityStatus::Executing)
                    .unwrap_or(true)
            });
            match position {
                Some(pos) => {
                    if let Some(id) = order.remove(pos) {
                        self.entries.remove(&id);
                    }
                }
                None => break,
            }
        }
    }

    /// Live handle, or None for an unknown id.
    pub fn get(&self, id: &Uuid) -> Option<SharedOpportunity> {
        self.entries.get(id).map(|entry| entry.clone())
    }

    /// Point-in-time clone, or None for an unknown id.
    pub fn snapshot(&self, id: &Uuid) -> Option<Opportunity> {
        self.entries.get(id).map(|entry| entry.read().clone())
    }

    /// Snapshots of every stored opportunity in insertion order.
    pub fn all(&self) -> Vec<Opportunity> {
        let order = self.order.lock();
        order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| entry.read().clone()))
            .collect()
    }

    pub fn count_by_status(&self, status: OpportunityStatus) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().read().status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OpportunityStore {
    fn default() -> Self {
        Self::new()
    }
}
