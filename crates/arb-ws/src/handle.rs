//! Clonable subscription handle for one connection.
//!
//! Mutations land in the desired-topic set first so they survive
//! disconnects; the wire frame is only queued while the connection is
//! open, since replay covers everything else at the next connect.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

use crate::connection::ConnectionState;
use crate::subscription::TopicSet;

/// Control frame queued for the connection's message loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsOutbound {
    Subscribe(String),
    Unsubscribe(String),
}

/// Clonable handle for driving subscriptions on a live connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    outbound_tx: mpsc::Sender<WsOutbound>,
    state: Arc<RwLock<ConnectionState>>,
    topics: Arc<TopicSet>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        outbound_tx: mpsc::Sender<WsOutbound>,
        state: Arc<RwLock<ConnectionState>>,
        topics: Arc<TopicSet>,
    ) -> Self {
        Self {
            outbound_tx,
            state,
            topics,
        }
    }

    /// Mark a topic as desired. Returns false if it was already
    /// subscribed; the wire frame is sent only for new topics on a
    /// live connection.
    pub fn subscribe(&self, topic: &str) -> bool {
        let added = self.topics.add(topic);
        if added && self.is_connected() {
            self.queue(WsOutbound::Subscribe(topic.to_string()));
        }
        added
    }

    /// Withdraw a topic. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let removed = self.topics.remove(topic);
        if removed && self.is_connected() {
            self.queue(WsOutbound::Unsubscribe(topic.to_string()));
        }
        removed
    }

    pub fn is_connected(&self) -> bool {
        *self.state.read() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Current desired topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        self.topics.snapshot()
    }

    fn queue(&self, frame: WsOutbound) {
        if let Err(e) = self.outbound_tx.try_send(frame) {
            warn!(?e, "Outbound control queue full, relying on replay");
        }
    }
}
