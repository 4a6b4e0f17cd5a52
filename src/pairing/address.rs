//! Local network address discovery.
//!
//! A connected UDP socket sends nothing; it only makes the OS resolve a
//! route and pick the source address for it. Probing targets inside each
//! private range in preference order yields the address the companion can
//! reach us on, with the default route's source as a last resort.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use tracing::debug;

/// Find a private-range local address, preferring 192.168.x.x, then
/// 10.x.x.x, then 172.16-31.x.x, falling back to whatever source the
/// default route uses.
pub fn local_private_address() -> Option<IpAddr> {
    let probes: [(Ipv4Addr, fn(Ipv4Addr) -> bool); 3] = [
        (Ipv4Addr::new(192, 168, 255, 255), is_192_168),
        (Ipv4Addr::new(10, 255, 255, 255), is_10),
        (Ipv4Addr::new(172, 31, 255, 255), is_172_16),
    ];

    for (target, in_range) in probes {
        if let Some(IpAddr::V4(source)) = route_source(target) {
            if in_range(source) {
                debug!(%source, "selected private local address");
                return Some(IpAddr::V4(source));
            }
        }
    }

    route_source(Ipv4Addr::new(8, 8, 8, 8))
}

fn route_source(target: Ipv4Addr) -> Option<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect((target, 80)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

fn is_192_168(ip: Ipv4Addr) -> bool {
    let o = ip.octets();
    o[0] == 192 && o[1] == 168
}

fn is_10(ip: Ipv4Addr) -> bool {
    ip.octets()[0] == 10
}

fn is_172_16(ip: Ipv4Addr) -> bool {
    let o = ip.octets();
    o[0] == 172 && (16..=31).contains(&o[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_predicates() {
        assert!(is_192_168(Ipv4Addr::new(192, 168, 1, 5)));
        assert!(!is_192_168(Ipv4Addr::new(192, 169, 1, 5)));
        assert!(is_10(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(is_172_16(Ipv4Addr::new(172, 16, 0, 1)));
        assert!(is_172_16(Ipv4Addr::new(172, 31, 255, 1)));
        assert!(!is_172_16(Ipv4Addr::new(172, 32, 0, 1)));
        assert!(!is_172_16(Ipv4Addr::new(173, 16, 0, 1)));
    }

    #[test]
    fn test_discovery_does_not_panic() {
        // Result depends on the host's routes; only the call contract is
        // checked here.
        let _ = local_private_address();
    }
}
