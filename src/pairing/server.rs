//! One-shot payload server for companion pairing.
//!
//! Listens on an ephemeral port and serves a single static payload (the
//! companion installer) to plain HTTP GETs on a few path aliases. The
//! first peer to fetch it completes discovery; later requests are still
//! served but the discovered address does not change.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Paths the installer is served on
const PAYLOAD_PATHS: [&str; 3] = ["/", "/companion", "/companion.zip"];

/// Upper bound on a request head; a browser GET fits many times over
const MAX_REQUEST_HEAD: usize = 4096;

/// Errors that can occur while setting up pairing
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("no usable local network address")]
    NoLocalAddress,

    #[error("companion payload unavailable: {0}")]
    PayloadUnavailable(std::io::Error),

    #[error("failed to bind pairing listener: {0}")]
    Bind(std::io::Error),
}

/// Ephemeral pairing listener
#[derive(Debug)]
pub struct PairingServer {
    local_addr: SocketAddr,
    listener: TcpListener,
    payload: Arc<Vec<u8>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl PairingServer {
    /// Bind an ephemeral port on the given address
    pub async fn bind(ip: IpAddr, payload: Vec<u8>) -> Result<Self, PairingError> {
        let listener = TcpListener::bind((ip, 0)).await.map_err(PairingError::Bind)?;
        let local_addr = listener.local_addr().map_err(PairingError::Bind)?;
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(%local_addr, payload_len = payload.len(), "pairing listener bound");

        Ok(Self {
            local_addr,
            listener,
            payload: Arc::new(payload),
            shutdown_tx,
        })
    }

    /// Where the installer can be fetched from
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until a peer fetches the payload, the deadline passes, or a
    /// cancel signal arrives.
    ///
    /// Returns the first successful peer's address, or `None` on timeout
    /// or cancellation. The listener is torn down either way; a later
    /// pairing attempt binds afresh.
    pub async fn wait_for_peer(
        self,
        deadline: Duration,
        mut cancel: broadcast::Receiver<()>,
    ) -> Option<IpAddr> {
        let (found_tx, mut found_rx) = mpsc::channel::<IpAddr>(1);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let listener = self.listener;
        let payload = Arc::clone(&self.payload);

        let accept_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                debug!(%peer, "pairing request");
                                let payload = Arc::clone(&payload);
                                let found_tx = found_tx.clone();
                                tokio::spawn(async move {
                                    match serve_payload(stream, &payload).await {
                                        // Only the first hit matters; a full
                                        // channel means discovery already
                                        // completed.
                                        Ok(true) => {
                                            let _ = found_tx.try_send(peer.ip());
                                        }
                                        Ok(false) => {}
                                        Err(e) => debug!(%peer, ?e, "pairing request failed"),
                                    }
                                });
                            }
                            Err(e) => warn!(?e, "pairing accept error"),
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            debug!("pairing listener stopped");
        });

        let discovered = tokio::select! {
            found = tokio::time::timeout(deadline, found_rx.recv()) => found.ok().flatten(),
            _ = cancel.recv() => {
                debug!("pairing wait cancelled");
                None
            }
        };

        let _ = self.shutdown_tx.send(());
        let _ = accept_task.await;

        match discovered {
            Some(peer) => info!(%peer, "companion discovered"),
            None => info!("pairing wait ended without a peer"),
        }
        discovered
    }
}

/// Serve one request; true when the payload was delivered
async fn serve_payload(mut stream: TcpStream, payload: &[u8]) -> std::io::Result<bool> {
    let mut head = vec![0u8; MAX_REQUEST_HEAD];
    let mut read = 0;
    loop {
        if read == head.len() {
            break;
        }
        let n = stream.read(&mut head[read..]).await?;
        if n == 0 {
            break;
        }
        read += n;
        if head[..read].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let request = String::from_utf8_lossy(&head[..read]);
    let mut line = request.lines().next().unwrap_or("").split_whitespace();
    let method = line.next().unwrap_or("");
    let path = line.next().unwrap_or("");

    let hit = method == "GET" && PAYLOAD_PATHS.contains(&path);
    if hit {
        let header = format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: application/octet-stream\r\n\
             Content-Disposition: attachment; filename=\"companion.zip\"\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n",
            payload.len()
        );
        stream.write_all(header.as_bytes()).await?;
        stream.write_all(payload).await?;
    } else {
        stream
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await?;
    }
    stream.shutdown().await?;
    Ok(hit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    async fn fetch(addr: SocketAddr, path: &str) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        response
    }

    fn no_cancel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
        broadcast::channel(1)
    }

    #[tokio::test]
    async fn test_timeout_returns_none_and_frees_port() {
        let server = PairingServer::bind(LOOPBACK, b"payload".to_vec()).await.unwrap();
        let addr = server.local_addr();

        let (_cancel_tx, cancel_rx) = no_cancel();
        assert_eq!(
            server.wait_for_peer(Duration::from_millis(50), cancel_rx).await,
            None
        );

        // The listener is gone; the port can be bound again.
        let rebound = std::net::TcpListener::bind(addr);
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn test_first_fetch_completes_discovery() {
        let server = PairingServer::bind(LOOPBACK, b"installer-bytes".to_vec())
            .await
            .unwrap();
        let addr = server.local_addr();

        let (_cancel_tx, cancel_rx) = no_cancel();
        let wait = tokio::spawn(server.wait_for_peer(Duration::from_secs(5), cancel_rx));
        let response = fetch(addr, "/companion.zip").await;

        let text = String::from_utf8_lossy(&response);
        assert!(text.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with(b"installer-bytes"));

        assert_eq!(wait.await.unwrap(), Some(LOOPBACK));
    }

    #[tokio::test]
    async fn test_unknown_path_serves_404_without_discovery() {
        let server = PairingServer::bind(LOOPBACK, b"payload".to_vec()).await.unwrap();
        let addr = server.local_addr();

        let (_cancel_tx, cancel_rx) = no_cancel();
        let wait = tokio::spawn(server.wait_for_peer(Duration::from_millis(300), cancel_rx));
        let response = fetch(addr, "/other").await;
        assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 404"));

        assert_eq!(wait.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_root_alias_served() {
        let server = PairingServer::bind(LOOPBACK, b"zip".to_vec()).await.unwrap();
        let addr = server.local_addr();

        let (_cancel_tx, cancel_rx) = no_cancel();
        let wait = tokio::spawn(server.wait_for_peer(Duration::from_secs(5), cancel_rx));
        let response = fetch(addr, "/").await;
        assert!(String::from_utf8_lossy(&response).contains("200 OK"));
        assert_eq!(wait.await.unwrap(), Some(LOOPBACK));
    }

    #[tokio::test]
    async fn test_cancel_ends_wait_early() {
        let server = PairingServer::bind(LOOPBACK, b"zip".to_vec()).await.unwrap();
        let addr = server.local_addr();

        let (cancel_tx, cancel_rx) = no_cancel();
        let wait = tokio::spawn(server.wait_for_peer(Duration::from_secs(60), cancel_rx));
        cancel_tx.send(()).unwrap();

        assert_eq!(wait.await.unwrap(), None);
        assert!(std::net::TcpListener::bind(addr).is_ok());
    }
}
