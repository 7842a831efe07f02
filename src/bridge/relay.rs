//! Bridge connection management.
//!
//! The bridge owns at most one connection. A `listen` request while a handle
//! is held is dropped silently, even when that connection has already gone
//! dead; only an explicit `close` releases the handle. Nothing is reported
//! back to the application on failure, it simply stops seeing payloads.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use crate::js::engine::TOKIO;

/// WebSocket ready states (matching browser API)
pub const WS_CONNECTING: u32 = 0;
pub const WS_OPEN: u32 = 1;
pub const WS_CLOSING: u32 = 2;
pub const WS_CLOSED: u32 = 3;

/// Receives every payload relayed from the socket, in arrival order.
pub trait InboundListener: Send + Sync {
    fn receive(&self, payload: String);
}

/// The one live connection, if any.
struct ConnectionHandle {
    url: String,
    ready_state: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

/// Relays messages between the hosted application and one WebSocket.
pub struct SocketBridge {
    inbound: Arc<dyn InboundListener>,
    connection: Mutex<Option<ConnectionHandle>>,
}

impl SocketBridge {
    /// Create a bridge that forwards inbound payloads to `inbound`.
    pub fn new(inbound: Arc<dyn InboundListener>) -> Self {
        Self {
            inbound,
            connection: Mutex::new(None),
        }
    }

    /// Open a connection to `url` unless one is already held.
    pub fn listen(&self, url: String) {
        let mut connection = self.connection.lock().unwrap();
        if connection.is_some() {
            log::debug!("[bridge] listen({}) ignored: connection already held", url);
            return;
        }

        log::info!("[bridge] opening connection to {}", url);
        let ready_state = Arc::new(AtomicU32::new(WS_CONNECTING));
        let task = TOKIO.spawn(run_connection(
            url.clone(),
            ready_state.clone(),
            self.inbound.clone(),
        ));

        *connection = Some(ConnectionHandle {
            url,
            ready_state,
            task,
        });
    }

    /// Terminate the held connection, if any, and release the handle.
    pub fn close(&self) {
        let mut connection = self.connection.lock().unwrap();
        if let Some(handle) = connection.take() {
            handle.ready_state.store(WS_CLOSED, Ordering::SeqCst);
            handle.task.abort();
            log::info!("[bridge] closed connection to {}", handle.url);
        }
    }

    /// Ready state of the held connection, `WS_CLOSED` when none is held.
    pub fn ready_state(&self) -> u32 {
        self.connection
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| handle.ready_state.load(Ordering::SeqCst))
            .unwrap_or(WS_CLOSED)
    }

    /// Target URL of the held connection.
    pub fn connected_url(&self) -> Option<String> {
        self.connection
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| handle.url.clone())
    }
}

/// Drive one connection: dial, handshake, then relay text frames inbound
/// until the socket ends. The held handle is never cleared from here; the
/// application must `close` before it can listen again.
async fn run_connection(
    url: String,
    ready_state: Arc<AtomicU32>,
    inbound: Arc<dyn InboundListener>,
) {
    log::info!("[socket] connecting to {}", url);

    let parsed = match url::Url::parse(&url) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::error!("[socket] invalid URL {}: {}", url, e);
            ready_state.store(WS_CLOSED, Ordering::SeqCst);
            return;
        }
    };

    let host = parsed.host_str().unwrap_or("localhost");
    let port = parsed
        .port()
        .unwrap_or(if parsed.scheme() == "wss" { 443 } else { 80 });
    let addr = format!("{}:{}", host, port);

    let tcp_stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("[socket] TCP connection to {} failed: {}", addr, e);
            ready_state.store(WS_CLOSED, Ordering::SeqCst);
            return;
        }
    };

    let request = match url.as_str().into_client_request() {
        Ok(request) => request,
        Err(e) => {
            log::error!("[socket] failed to build handshake request: {}", e);
            ready_state.store(WS_CLOSED, Ordering::SeqCst);
            return;
        }
    };

    let mut ws_stream = match tokio_tungstenite::client_async(request, tcp_stream).await {
        Ok((stream, response)) => {
            log::info!("[socket] connected to {} (status: {})", url, response.status());
            stream
        }
        Err(e) => {
            log::error!("[socket] handshake with {} failed: {}", url, e);
            ready_state.store(WS_CLOSED, Ordering::SeqCst);
            return;
        }
    };

    ready_state.store(WS_OPEN, Ordering::SeqCst);

    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if ready_state.load(Ordering::SeqCst) == WS_CLOSED {
                    break;
                }
                log::debug!("[socket] received {} bytes", text.len());
                inbound.receive(text.to_string());
            }
            Ok(Message::Binary(data)) => {
                log::debug!("[socket] skipping binary frame ({} bytes)", data.len());
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Handled by tungstenite
            }
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.to_string()))
                    .unwrap_or((1000, String::new()));
                log::info!("[socket] remote closed: {} {}", code, reason);
                ready_state.store(WS_CLOSED, Ordering::SeqCst);
                break;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                log::error!("[socket] read error: {}", e);
                ready_state.store(WS_CLOSED, Ordering::SeqCst);
                break;
            }
        }
    }

    log::info!("[socket] connection ended");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use futures_util::SinkExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_async;

    use super::*;

    struct Collector {
        tx: mpsc::UnboundedSender<String>,
    }

    impl InboundListener for Collector {
        fn receive(&self, payload: String) {
            let _ = self.tx.send(payload);
        }
    }

    fn test_bridge() -> (SocketBridge, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SocketBridge::new(Arc::new(Collector { tx })), rx)
    }

    /// Accepts and counts connections, holding each one open.
    async fn hold_open_server() -> (std::net::SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    if let Ok(_ws) = accept_async(stream).await {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                });
            }
        });

        (addr, accepted)
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    #[tokio::test]
    async fn listen_is_a_no_op_while_a_connection_is_held() {
        let (addr, accepted) = hold_open_server().await;
        let (bridge, _rx) = test_bridge();

        let first = format!("ws://{}/first", addr);
        bridge.listen(first.clone());
        bridge.listen(format!("ws://{}/second", addr));
        bridge.listen(format!("ws://{}/third", addr));

        wait_until(|| bridge.ready_state() == WS_OPEN).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.connected_url().as_deref(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn close_releases_the_handle_for_reopen() {
        let (addr, accepted) = hold_open_server().await;
        let (bridge, _rx) = test_bridge();

        bridge.listen(format!("ws://{}/first", addr));
        wait_until(|| bridge.ready_state() == WS_OPEN).await;

        bridge.close();
        assert_eq!(bridge.ready_state(), WS_CLOSED);
        assert_eq!(bridge.connected_url(), None);

        let second = format!("ws://{}/second", addr);
        bridge.listen(second.clone());
        wait_until(|| bridge.ready_state() == WS_OPEN).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(accepted.load(Ordering::SeqCst), 2);
        assert_eq!(bridge.connected_url().as_deref(), Some(second.as_str()));
    }

    #[tokio::test]
    async fn relays_payloads_unmodified_and_in_order() {
        let payloads = ["first", "{\"second\":2}", "third with \"quotes\" and α"];

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            for payload in payloads {
                ws.send(Message::Text(payload.into())).await.unwrap();
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let (bridge, mut rx) = test_bridge();
        bridge.listen(format!("ws://{}", addr));

        for expected in payloads {
            let got = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for payload")
                .expect("inbound channel closed");
            assert_eq!(got, expected);
        }
    }

    #[tokio::test]
    async fn no_relay_before_listen() {
        let (_bridge, mut rx) = test_bridge();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_detaches_the_inbound_handler() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (late_tx, late_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = late_rx.await;
            // The bridge side is already torn down; the send may fail.
            let _ = ws.send(Message::Text("late".into())).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let (bridge, mut rx) = test_bridge();
        bridge.listen(format!("ws://{}", addr));
        wait_until(|| bridge.ready_state() == WS_OPEN).await;

        bridge.close();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let _ = late_tx.send(());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn remote_close_does_not_release_the_handle() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    if let Ok(mut ws) = accept_async(stream).await {
                        let _ = ws.close(None).await;
                    }
                });
            }
        });

        let (bridge, _rx) = test_bridge();
        let first = format!("ws://{}/first", addr);
        bridge.listen(first.clone());
        wait_until(|| bridge.ready_state() == WS_CLOSED).await;

        // The dead handle still guards until an explicit close.
        bridge.listen(format!("ws://{}/second", addr));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.connected_url().as_deref(), Some(first.as_str()));
    }
}
