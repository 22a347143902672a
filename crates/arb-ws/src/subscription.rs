//! Desired-subscription tracking.
//!
//! The topic set records what the caller wants subscribed, independent
//! of connection state. It survives disconnects so the connection can
//! replay every topic after a reconnect without outside help.

use parking_lot::RwLock;
use std::collections::HashSet;

/// Set of topics a connection should be subscribed to.
#[derive(Debug, Default)]
pub struct TopicSet {
    topics: RwLock<HashSet<String>>,
}

impl TopicSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic. Returns false if it was already present, making
    /// repeated subscribes idempotent.
    pub fn add(&self, topic: &str) -> bool {
        self.topics.write().insert(topic.to_string())
    }

    /// Remove a topic. Returns false if it was not present.
    pub fn remove(&self, topic: &str) -> bool {
        self.topics.write().remove(topic)
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.read().contains(topic)
    }

    /// Sorted copy of the current topics. Replay iterates this so the
    /// subscribe order after a reconnect is deterministic.
    pub fn snapshot(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.read().iter().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }

    pub fn clear(&self) {
        self.topics.write().clear();
    }
}
