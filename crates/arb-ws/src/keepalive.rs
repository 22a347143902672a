//! Keepalive tracking for feed connections.
//!
//! A quiet feed is indistinguishable from a dead socket, so after
//! `interval` without inbound traffic the connection sends a ping and a
//! missing pong within `timeout` tears the session down for reconnect.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct KeepaliveState {
    last_ping: Option<Instant>,
    last_traffic: Instant,
    awaiting_pong: bool,
}

/// Liveness tracker owned by one connection.
#[derive(Debug)]
pub struct Keepalive {
    interval: Duration,
    timeout: Duration,
    state: Mutex<KeepaliveState>,
}

impl Keepalive {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
            state: Mutex::new(KeepaliveState {
                last_ping: None,
                last_traffic: Instant::now(),
                awaiting_pong: false,
            }),
        }
    }

    /// Called on (re)connect before the message loop starts.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.last_ping = None;
        state.last_traffic = Instant::now();
        state.awaiting_pong = false;
    }

    pub fn record_ping(&self) {
        let mut state = self.state.lock();
        state.last_ping = Some(Instant::now());
        state.awaiting_pong = true;
    }

    pub fn record_pong(&self) {
        self.state.lock().awaiting_pong = false;
    }

    /// Any inbound frame counts as liveness.
    pub fn record_traffic(&self) {
        self.state.lock().last_traffic = Instant::now();
    }

    /// True when a ping went unanswered past the timeout.
    pub fn is_timed_out(&self) -> bool {
        let state = self.state.lock();
        if !state.awaiting_pong {
            return false;
        }
        state
            .last_ping
            .map(|ping| ping.elapsed() > self.timeout)
            .unwrap_or(false)
    }

    /// True when the feed has been silent for the full interval and no
    /// ping is outstanding.
    pub fn should_ping(&self) -> bool {
        let state = self.state.lock();
        !state.awaiting_pong && state.last_traffic.elapsed() >= self.interval
    }

    /// Sleep until the next liveness check. Runs at half the interval
    /// so a silent feed is pinged at most one check late.
    pub async fn next_check(&self) {
        tokio::time::sleep(self.interval / 2).await;
    }
}
