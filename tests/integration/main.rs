//! hostmon integration test harness.
//!
//! These tests push real datagrams through loopback sockets: announcements
//! into the codec and registry, status events out through the UDP notifier.
//! Multicast tests need a route for the group on this host; when the
//! environment has none they print a SKIP line and return.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};

mod multicast;
mod presence;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Group used by multicast tests; distinct from the daemon default.
pub const TEST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 77, 1);

/// A loopback UDP socket with a read timeout, for receiving events.
pub fn event_sink() -> Result<UdpSocket> {
    let socket = UdpSocket::bind("127.0.0.1:0").context("bind event sink")?;
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .context("set_read_timeout")?;
    Ok(socket)
}

/// Receive one datagram and parse it as JSON.
pub fn recv_json(socket: &UdpSocket) -> Result<serde_json::Value> {
    let mut buf = [0u8; 2048];
    let (len, _) = socket.recv_from(&mut buf).context("no datagram received")?;
    serde_json::from_slice(&buf[..len]).context("datagram is not JSON")
}

/// A socket joined to `TEST_GROUP` on an ephemeral port, or `None` if the
/// host cannot do multicast.
pub fn multicast_receiver() -> Option<(UdpSocket, SocketAddr)> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).ok()?;
    socket.set_reuse_address(true).ok()?;
    socket
        .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())
        .ok()?;
    socket
        .join_multicast_v4(&TEST_GROUP, &Ipv4Addr::UNSPECIFIED)
        .ok()?;
    let port = socket.local_addr().ok()?.as_socket()?.port();

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(Duration::from_secs(2))).ok()?;
    Some((socket, SocketAddrV4::new(TEST_GROUP, port).into()))
}

/// Sender with loopback enabled so the local receiver hears it.
pub fn multicast_sender() -> Option<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).ok()?;
    socket.set_multicast_ttl_v4(1).ok()?;
    socket.set_multicast_loop_v4(true).ok()?;
    Some(socket.into())
}
