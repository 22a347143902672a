//! Mock exchange WebSocket server for integration tests.
//!
//! Accepts connections, waits for the client's subscribe frame, then
//! streams a canned market-data frame at a fixed cadence. The silent
//! variant completes the handshake and then ignores the socket, so
//! client pings go unanswered.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Cadence of the canned data frames.
const FRAME_INTERVAL: Duration = Duration::from_millis(25);

/// A WebSocket server that plays one exchange's data stream.
pub struct MockExchange {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    drop_tx: broadcast::Sender<()>,
    connections: Arc<AtomicU32>,
    subscribes: Arc<AtomicU32>,
}

impl MockExchange {
    /// Start on an ephemeral port, streaming `frame` to every client
    /// after its first inbound message.
    pub async fn start(frame: &str) -> Self {
        Self::start_inner(Some(frame.to_string())).await
    }

    /// Start a server that accepts the handshake and then never reads,
    /// so subscribes and pings vanish into the socket.
    pub async fn start_silent() -> Self {
        Self::start_inner(None).await
    }

    async fn start_inner(frame: Option<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicU32::new(0));
        let subscribes = Arc::new(AtomicU32::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (drop_tx, _) = broadcast::channel::<()>(4);

        let connections_clone = connections.clone();
        let subscribes_clone = subscribes.clone();
        let drop_for_connections = drop_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        connections_clone.fetch_add(1, Ordering::SeqCst);
                        match frame.clone() {
                            Some(frame) => {
                                tokio::spawn(handle_connection(
                                    stream,
                                    frame,
                                    subscribes_clone.clone(),
                                    drop_for_connections.subscribe(),
                                ));
                            }
                            None => {
                                tokio::spawn(handle_silent_connection(
                                    stream,
                                    drop_for_connections.subscribe(),
                                ));
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            drop_tx,
            connections,
            subscribes,
        }
    }

    /// The server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of connections accepted so far.
    pub fn connection_count(&self) -> u32 {
        self.connections.load(Ordering::SeqCst)
    }

    /// Subscribe handshakes completed, one per connection.
    pub fn subscribe_count(&self) -> u32 {
        self.subscribes.load(Ordering::SeqCst)
    }

    /// Close every live connection server-side. Later connections are
    /// unaffected, so clients can reconnect.
    pub fn drop_connections(&self) {
        let _ = self.drop_tx.send(());
    }

    /// Stop accepting connections. Live connections end when their
    /// clients disconnect.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    frame: String,
    subscribes: Arc<AtomicU32>,
    mut drop_rx: broadcast::Receiver<()>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    let (mut write, mut read) = ws_stream.split();

    // Wait for the subscribe frame before streaming data.
    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(_))) => {
                    subscribes.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            _ = drop_rx.recv() => {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
        }
    }

    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if write.send(Message::Text(frame.clone())).await.is_err() {
                    return;
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            _ = drop_rx.recv() => {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

async fn handle_silent_connection(stream: TcpStream, mut drop_rx: broadcast::Receiver<()>) {
    let mut ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    // Polling the read half would auto-queue pong replies, so the
    // socket stays unread until the server is torn down.
    let _ = drop_rx.recv().await;
    let _ = ws_stream.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockExchange::start("{}").await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }
}
