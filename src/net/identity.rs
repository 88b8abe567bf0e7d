//! Advertised host detection.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Address of the interface used for outbound traffic.
pub fn local_ip() -> IpAddr {
    outbound_ip().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Cannot determine outbound address, using loopback");
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    })
}

fn outbound_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
    Ok(socket.local_addr()?.ip())
}

/// The configured host, or the outbound address when it is empty.
pub fn resolve_host(configured: &str) -> String {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        local_ip().to_string()
    } else {
        trimmed.to_string()
    }
}
