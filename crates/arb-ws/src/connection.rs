//! WebSocket connection manager.
//!
//! Owns one exchange connection end to end: connect, keepalive,
//! subscription replay, and automatic reconnection with exponential
//! backoff. Vendor wire formats come from the [`SubscriptionCodec`]
//! supplied by the feed layer.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::SubscriptionCodec;
use crate::error::{WsError, WsResult};
use crate::handle::{ConnectionHandle, WsOutbound};
use crate::keepalive::Keepalive;
use crate::subscription::TopicSet;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Label used in log lines (the exchange id).
    pub label: String,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Delay cap for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Keepalive ping interval.
    pub ping_interval_ms: u64,
    /// Pong must arrive within this after a ping.
    pub ping_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            label: String::new(),
            max_reconnect_attempts: 10,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 30_000,
            ping_interval_ms: 30_000,
            ping_timeout_ms: 10_000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// WebSocket connection manager for one exchange.
pub struct ConnectionManager {
    config: ConnectionConfig,
    codec: Arc<dyn SubscriptionCodec>,
    state: Arc<RwLock<ConnectionState>>,
    topics: Arc<TopicSet>,
    keepalive: Keepalive,
    /// Raw inbound text frames, forwarded to the normalizer.
    inbound_tx: mpsc::Sender<String>,
    reconnect_count: Arc<RwLock<u32>>,
    outbound_tx: mpsc::Sender<WsOutbound>,
    outbound_rx: TokioMutex<mpsc::Receiver<WsOutbound>>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        codec: Arc<dyn SubscriptionCodec>,
        inbound_tx: mpsc::Sender<String>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(100);
        Self {
            keepalive: Keepalive::new(config.ping_interval_ms, config.ping_timeout_ms),
            config,
            codec,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            topics: Arc::new(TopicSet::new()),
            inbound_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            outbound_tx,
            outbound_rx: TokioMutex::new(outbound_rx),
            shutdown: CancellationToken::new(),
        }
    }

    /// Clonable handle for subscription changes from other tasks.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle::new(
            self.outbound_tx.clone(),
            self.state.clone(),
            self.topics.clone(),
        )
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Consecutive failed attempts since the last healthy session.
    pub fn reconnect_attempts(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown. Both the session loop and any backoff
    /// sleep exit promptly.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run the connection until shutdown or reconnect exhaustion.
    ///
    /// Every session failure is absorbed into the retry loop; the only
    /// error this returns is [`WsError::ReconnectExhausted`], after
    /// which the connection stays down for good.
    pub async fn run(&self) -> WsResult<()> {
        loop {
            if self.is_shutdown() {
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = if self.reconnect_attempts() == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            };

            match self.run_session().await {
                Ok(()) => info!(label = %self.config.label, "connection closed"),
                Err(e) => warn!(label = %self.config.label, error = %e, "connection error"),
            }

            if self.is_shutdown() {
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            let attempt = {
                let mut count = self.reconnect_count.write();
                *count += 1;
                *count
            };

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(
                    label = %self.config.label,
                    attempt,
                    "max reconnect attempts reached, giving up"
                );
                *self.state.write() = ConnectionState::Disconnected;
                return Err(WsError::ReconnectExhausted { attempts: attempt });
            }

            *self.state.write() = ConnectionState::Reconnecting;
            let delay = backoff_delay(&self.config, attempt);
            warn!(
                label = %self.config.label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnecting after backoff"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => {
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    /// One connect-to-disconnect cycle.
    async fn run_session(&self) -> WsResult<()> {
        info!(label = %self.config.label, url = %self.config.url, "connecting");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = ConnectionState::Connected;
        *self.reconnect_count.write() = 0;
        info!(label = %self.config.label, "connected");

        self.replay_subscriptions(&mut write, &mut read).await?;
        self.keepalive.reset();

        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                () = self.shutdown.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "failed to send close frame during shutdown");
                    }
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.keepalive.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "normal close".to_string()));
                            warn!(label = %self.config.label, code, %reason, "closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            return Err(e.into());
                        }
                        None => {
                            warn!(label = %self.config.label, "stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(frame) = outbound {
                        self.send_control(&mut write, frame).await?;
                    }
                }

                _ = self.keepalive.next_check() => {
                    if self.keepalive.is_timed_out() {
                        error!(label = %self.config.label, "keepalive timeout");
                        return Err(WsError::HeartbeatTimeout);
                    }
                    if self.keepalive.should_ping() {
                        match self.codec.ping_frame() {
                            Some(text) => write.send(Message::Text(text)).await?,
                            None => write.send(Message::Ping(Vec::new())).await?,
                        }
                        self.keepalive.record_ping();
                        debug!(label = %self.config.label, "sent keepalive ping");
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) {
        self.keepalive.record_traffic();

        if self.codec.is_pong_frame(text) {
            self.keepalive.record_pong();
            return;
        }

        if self.inbound_tx.send(text.to_string()).await.is_err() {
            warn!(label = %self.config.label, "inbound receiver dropped");
        }
    }

    async fn send_control(&self, write: &mut WsSink, frame: WsOutbound) -> WsResult<()> {
        match frame {
            WsOutbound::Subscribe(topic) => {
                if let Some(text) = self.codec.subscribe_frame(&topic) {
                    debug!(label = %self.config.label, %topic, "subscribing");
                    write.send(Message::Text(text)).await?;
                }
            }
            WsOutbound::Unsubscribe(topic) => {
                if let Some(text) = self.codec.unsubscribe_frame(&topic) {
                    debug!(label = %self.config.label, %topic, "unsubscribing");
                    write.send(Message::Text(text)).await?;
                }
            }
        }
        Ok(())
    }

    /// Resubscribe every desired topic after a (re)connect, pacing the
    /// sends and draining responses so the server is not flooded.
    async fn replay_subscriptions(&self, write: &mut WsSink, read: &mut WsSource) -> WsResult<()> {
        let topics = self.topics.snapshot();
        if topics.is_empty() {
            return Ok(());
        }

        info!(label = %self.config.label, count = topics.len(), "replaying subscriptions");

        // Let the server settle before the subscription burst.
        tokio::time::sleep(Duration::from_millis(250)).await;

        for topic in &topics {
            let Some(frame) = self.codec.subscribe_frame(topic) else {
                continue;
            };
            write.send(Message::Text(frame)).await?;
            self.drain_and_wait(write, read, 100).await?;
        }

        info!(label = %self.config.label, total = topics.len(), "subscriptions replayed");
        Ok(())
    }

    /// Read whatever the server pushes back for `wait_ms` between
    /// subscription sends.
    async fn drain_and_wait(
        &self,
        write: &mut WsSink,
        read: &mut WsSource,
        wait_ms: u64,
    ) -> WsResult<()> {
        let budget = Duration::from_millis(wait_ms);
        let start = std::time::Instant::now();

        loop {
            let remaining = budget.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }

            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.keepalive.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "close during subscribe".to_string()));
                            warn!(label = %self.config.label, code, %reason, "closed during subscribe");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            return Err(e.into());
                        }
                        None => {
                            return Err(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "stream ended during subscribe".to_string(),
                            });
                        }
                        _ => {}
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(20)) => {
                    let final_wait = budget.saturating_sub(start.elapsed());
                    tokio::time::sleep(final_wait).await;
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Pre-jitter backoff delay in milliseconds: `base * 1.5^(attempt-1)`,
/// capped at `max_ms`. Attempt 1 waits exactly the base delay.
fn backoff_delay_ms(base_ms: u64, max_ms: u64, attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(32) as i32;
    let raw = base_ms as f64 * 1.5f64.powi(exponent);
    raw.min(max_ms as f64) as u64
}

/// Jitter factor in [0.8, 1.2).
fn jitter_factor() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    0.8 + f64::from(nanos % 1000) / 1000.0 * 0.4
}

fn backoff_delay(config: &ConnectionConfig, attempt: u32) -> Duration {
    let pre_jitter = backoff_delay_ms(
        config.reconnect_base_delay_ms,
        config.reconnect_max_delay_ms,
        attempt,
    );
    Duration::from_millis((pre_jitter as f64 * jitter_factor()) as u64)
}
