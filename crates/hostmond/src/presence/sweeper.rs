//! Liveness sweep: evicts peers that stopped announcing.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use hostmon_core::now_ms;
use hostmon_services::SharedRegistry;

pub struct Sweeper {
    registry: SharedRegistry,
    interval: Duration,
    deadline_ms: u64,
    shutdown: broadcast::Receiver<()>,
}

impl Sweeper {
    pub fn new(
        registry: SharedRegistry,
        interval: Duration,
        deadline_ms: u64,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            registry,
            interval,
            deadline_ms,
            shutdown,
        }
    }

    /// Sweep every interval until shutdown.
    pub async fn run(mut self) -> Result<()> {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            deadline_ms = self.deadline_ms,
            "sweeper starting"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("sweeper stopping");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            let evicted = self.registry.sweep(now_ms(), self.deadline_ms);
            if !evicted.is_empty() {
                tracing::debug!(
                    removed = evicted.len(),
                    remaining = self.registry.len(),
                    "expired peer registry entries"
                );
            }
        }
    }
}
