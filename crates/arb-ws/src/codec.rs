//! Vendor subscription codec.
//!
//! The transport knows nothing about exchange wire formats. Each feed
//! adapter supplies a [`SubscriptionCodec`] that renders subscribe,
//! unsubscribe, and keepalive frames for its venue; the connection
//! replays them on every (re)connect.

/// Renders vendor control frames for one exchange.
///
/// Topics are opaque strings chosen by the caller (the feed layer uses
/// canonical pair symbols); the codec maps them to the venue's wire
/// format.
pub trait SubscriptionCodec: Send + Sync {
    /// Frame subscribing to one topic. None when the venue derives the
    /// subscription from the connection URL and no frame is needed.
    fn subscribe_frame(&self, topic: &str) -> Option<String>;

    /// Frame withdrawing one topic.
    fn unsubscribe_frame(&self, topic: &str) -> Option<String>;

    /// Vendor-level keepalive frame. None means the transport falls
    /// back to protocol-level pings.
    fn ping_frame(&self) -> Option<String> {
        None
    }

    /// Recognize a vendor-level pong text frame so it counts toward
    /// keepalive liveness instead of being forwarded as data.
    fn is_pong_frame(&self, _text: &str) -> bool {
        false
    }
}
