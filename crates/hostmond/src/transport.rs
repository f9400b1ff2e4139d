//! Multicast UDP sockets for announcements.
//!
//! Each activity creates and owns its own socket; nothing here is shared.

use std::net::{Ipv4Addr, SocketAddrV4};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Create a socket for sending to an IPv4 multicast group.
pub fn sender_socket(ttl: u32, multicast_loop: bool) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_multicast_ttl_v4(ttl).context("IP_MULTICAST_TTL")?;
    // Loop on so a second daemon on the same host sees this one.
    socket
        .set_multicast_loop_v4(multicast_loop)
        .context("IP_MULTICAST_LOOP")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).context("failed to convert to tokio UdpSocket")
}

/// Create a socket bound to the group port and joined to the group.
pub fn listener_socket(group: SocketAddrV4) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    // Several daemons on one host share the group port.
    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, group.port());
    socket.bind(&bind_addr.into()).context("bind()")?;

    socket
        .join_multicast_v4(group.ip(), &Ipv4Addr::UNSPECIFIED)
        .context("IP_ADD_MEMBERSHIP")?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).context("failed to convert to tokio UdpSocket")
}
