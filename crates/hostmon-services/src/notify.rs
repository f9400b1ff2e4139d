//! Status change notifications: peer online / peer offline events.
//!
//! Delivery is fire-and-forget. A notifier never reports failure back to
//! the registry; it logs and moves on.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use serde::Serialize;

/// Direction of a membership transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    BecameActive,
    BecameInactive,
}

impl PeerStatus {
    /// Numeric status carried in the event datagram.
    pub fn code(self) -> u8 {
        match self {
            PeerStatus::BecameActive => 1,
            PeerStatus::BecameInactive => 0,
        }
    }
}

/// A membership transition, copied out of the registry before delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub id: String,
    pub address: String,
    pub status: PeerStatus,
    pub architecture: String,
    /// Time the transition was detected, ms since epoch.
    pub timestamp_ms: u64,
}

/// Sink for status change events.
///
/// Called outside the registry lock, but still on the activity that
/// detected the change, so implementations must not block for long.
pub trait Notifier: Send + Sync {
    fn notify(&self, change: &StatusChange);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _change: &StatusChange) {}
}

// ── UDP sink ──────────────────────────────────────────────────────────────────

/// Event datagram layout expected by the local status consumer.
#[derive(Serialize)]
struct StatusEvent<'a> {
    address: &'a str,
    status: u8,
    provider_architecture: &'a str,
    timestamp: u64,
}

/// Sends one JSON datagram per event to a local UDP endpoint.
#[derive(Debug)]
pub struct UdpNotifier {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpNotifier {
    /// Bind an ephemeral socket of the target's address family.
    pub fn bind(target: SocketAddr) -> std::io::Result<Self> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Notifier for UdpNotifier {
    fn notify(&self, change: &StatusChange) {
        let event = StatusEvent {
            address: &change.address,
            status: change.status.code(),
            provider_architecture: &change.architecture,
            timestamp: change.timestamp_ms,
        };

        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode status event");
                return;
            }
        };

        match self.socket.send_to(&payload, self.target) {
            Ok(n) => tracing::trace!(bytes = n, target = %self.target, "status event sent"),
            Err(e) => tracing::warn!(
                error = %e,
                target = %self.target,
                peer = %change.id,
                "status event delivery failed"
            ),
        }
    }
}
