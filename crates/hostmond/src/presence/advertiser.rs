//! Announcement broadcast.
//!
//! Periodically sends this node's `Announcement` to the multicast group so
//! peers can discover it. Never touches the registry.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use hostmon_core::config::NetworkConfig;

use super::LocalNode;
use crate::transport;

pub struct Advertiser {
    node: LocalNode,
    socket: UdpSocket,
    dest: SocketAddr,
    interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl Advertiser {
    /// Open the multicast send socket. Fails if the socket cannot be set up.
    pub fn new(
        node: LocalNode,
        dest: SocketAddr,
        network: &NetworkConfig,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self> {
        let socket = transport::sender_socket(network.multicast_ttl, network.multicast_loop)
            .context("failed to create multicast send socket")?;
        Ok(Self::with_socket(node, socket, dest, interval, shutdown))
    }

    pub fn with_socket(
        node: LocalNode,
        socket: UdpSocket,
        dest: SocketAddr,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            node,
            socket,
            dest,
            interval,
            shutdown,
        }
    }

    /// Announce every interval until shutdown.
    ///
    /// A failed send skips that tick; the loop keeps going.
    pub async fn run(mut self) -> Result<()> {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            id = %self.node.id,
            dest = %self.dest,
            interval_ms = self.interval.as_millis() as u64,
            "advertiser starting"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("advertiser stopping");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            let payload = match self.node.describe().encode() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode announcement");
                    continue;
                }
            };

            match self.socket.send_to(&payload, self.dest).await {
                Ok(n) => tracing::trace!(bytes = n, "announcement sent"),
                Err(e) => tracing::warn!(error = %e, dest = %self.dest, "announcement send failed"),
            }
        }
    }
}
