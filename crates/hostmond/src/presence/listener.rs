//! Announcement listener.
//!
//! Joins the multicast group and feeds every decodable announcement into
//! the presence registry. Undecodable datagrams are dropped one at a time;
//! a failing receive ends the loop, since the socket is then assumed dead.

use std::net::{SocketAddr, SocketAddrV4};

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use hostmon_core::wire::MAX_DATAGRAM;
use hostmon_core::Announcement;
use hostmon_services::{Admission, PresenceRegistry, SharedRegistry};

use crate::transport;

pub struct Listener {
    socket: UdpSocket,
    registry: SharedRegistry,
    /// Announcements carrying this id are ours and are skipped.
    local_id: Option<String>,
    shutdown: broadcast::Receiver<()>,
}

impl Listener {
    /// Bind the group port and join the group. Fails if either step fails.
    pub fn new(
        group: SocketAddrV4,
        registry: SharedRegistry,
        local_id: Option<String>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self> {
        let socket = transport::listener_socket(group)
            .context("failed to create multicast listener socket")?;
        Ok(Self::with_socket(socket, registry, local_id, shutdown))
    }

    pub fn with_socket(
        socket: UdpSocket,
        registry: SharedRegistry,
        local_id: Option<String>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            socket,
            registry,
            local_id,
            shutdown,
        }
    }

    /// Receive until shutdown or until the socket fails.
    pub async fn run(mut self) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        tracing::info!(
            addr = ?self.socket.local_addr().ok(),
            "listener starting"
        );

        loop {
            let received = tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("listener stopping");
                    return Ok(());
                }
                r = self.socket.recv_from(&mut buf) => r,
            };

            let (len, source) = match received {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(error = %e, "recv_from failed, listener exiting");
                    return Err(e).context("multicast receive failed");
                }
            };

            handle_datagram(&self.registry, self.local_id.as_deref(), &buf[..len], source);
        }
    }
}

/// Decode one datagram and apply it to the registry.
///
/// Returns `None` when the datagram was dropped.
pub fn handle_datagram(
    registry: &PresenceRegistry,
    local_id: Option<&str>,
    payload: &[u8],
    source: SocketAddr,
) -> Option<Admission> {
    let announcement = match Announcement::decode(payload) {
        Ok(a) => a,
        Err(e) => {
            tracing::debug!(error = %e, from = %source, bytes = payload.len(), "dropping datagram");
            return None;
        }
    };

    if local_id == Some(announcement.id.as_str()) {
        tracing::trace!("ignoring own announcement");
        return None;
    }

    // The self-reported address is trusted; a mismatch is only noted.
    if !announcement.address.is_empty() && announcement.address != source.ip().to_string() {
        tracing::debug!(
            peer = %announcement.id,
            claimed = %announcement.address,
            from = %source,
            "announced address differs from source"
        );
    }

    match registry.admit_or_refresh(announcement) {
        Ok(status) => {
            tracing::trace!(from = %source, ?status, "announcement applied");
            Some(status)
        }
        Err(e) => {
            tracing::warn!(error = %e, from = %source, "announcement rejected");
            None
        }
    }
}
