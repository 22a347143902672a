//! WebSocket transport for exchange market-data connections.
//!
//! Provides robust WebSocket connectivity with:
//! - Automatic reconnection with exponential backoff and jitter
//! - Subscription tracking and replay after reconnect
//! - Keepalive pings with pong timeout detection
//! - Pluggable per-exchange subscription codecs
//!
//! The transport is protocol-agnostic: it moves text frames and tracks
//! topics, while [`SubscriptionCodec`] implementations supplied by the
//! feed layer decide what those frames look like per exchange.

pub mod codec;
pub mod connection;
pub mod error;
pub mod handle;
pub mod keepalive;
pub mod subscription;

pub use codec::SubscriptionCodec;
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState};
pub use error::{WsError, WsResult};
pub use handle::{ConnectionHandle, WsOutbound};
pub use keepalive::Keepalive;
pub use subscription::TopicSet;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
