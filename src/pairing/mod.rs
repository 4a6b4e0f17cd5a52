//! Companion pairing protocol.
//!
//! One-shot handshake for exam mode: find a private local address, serve
//! the companion installer over a short-lived listener, and treat the
//! first peer that fetches it as the companion machine. The companion
//! itself listens on a fixed WebSocket port once installed.

mod address;
mod server;

pub use address::local_private_address;
pub use server::{PairingError, PairingServer};

use std::net::IpAddr;
use std::path::Path;

use crate::config::COMPANION_PORT;

/// Read the installer payload and bind the pairing listener
pub async fn prepare(payload_path: &Path) -> Result<PairingServer, PairingError> {
    let payload = tokio::fs::read(payload_path)
        .await
        .map_err(PairingError::PayloadUnavailable)?;
    let ip = local_private_address().ok_or(PairingError::NoLocalAddress)?;
    PairingServer::bind(ip, payload).await
}

/// Companion endpoint derived from a discovered peer address
pub fn companion_endpoint(peer: IpAddr) -> String {
    format!("ws://{peer}:{COMPANION_PORT}")
}

/// Normalize a manually-entered companion address.
///
/// Users typically type just the IP shown on the companion screen; scheme
/// and port default to the companion's fixed WebSocket endpoint.
pub fn normalize_manual_address(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else {
        format!("ws://{trimmed}")
    };

    let authority = with_scheme.splitn(2, "://").nth(1)?;
    if authority.contains(':') {
        Some(with_scheme)
    } else {
        Some(format!("{with_scheme}:{COMPANION_PORT}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_companion_endpoint() {
        let peer = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 23));
        assert_eq!(companion_endpoint(peer), "ws://192.168.0.23:8765");
    }

    #[test]
    fn test_normalize_bare_ip() {
        assert_eq!(
            normalize_manual_address("192.168.0.7").as_deref(),
            Some("ws://192.168.0.7:8765")
        );
    }

    #[test]
    fn test_normalize_keeps_explicit_parts() {
        assert_eq!(
            normalize_manual_address("ws://192.168.0.7:9001").as_deref(),
            Some("ws://192.168.0.7:9001")
        );
        assert_eq!(
            normalize_manual_address("  10.1.2.3:8765 ").as_deref(),
            Some("ws://10.1.2.3:8765")
        );
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert_eq!(normalize_manual_address("   "), None);
    }

    #[tokio::test]
    async fn test_prepare_without_payload_fails() {
        let err = prepare(Path::new("/nonexistent/companion.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, PairingError::PayloadUnavailable(_)));
    }
}
