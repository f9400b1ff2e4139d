//! hostmond: multicast peer presence daemon.

use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinError;

use hostmon_core::config::HostmonConfig;
use hostmon_services::{Notifier, NullNotifier, PresenceRegistry, UdpNotifier};

mod host;
mod presence;
mod status;
mod transport;

use presence::{Advertiser, Listener, LocalNode, Sweeper};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = HostmonConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = HostmonConfig::load().context("failed to load configuration")?;

    // Local identity
    let system = host::SystemInfo::current()?;
    let local_id = match &config.identity.id {
        Some(id) => id.clone(),
        None => host::hostname().context("no identity.id configured and host name unavailable")?,
    };
    let node = LocalNode::from_config(local_id.clone(), &config.identity, &system);
    tracing::info!(
        id = %local_id,
        architecture = %system.machine,
        provides = ?node.provides,
        "hostmond starting"
    );

    // Registry + notifier
    let notifier: Arc<dyn Notifier> = if config.notify.enabled {
        let target = config.notify.target_addr()?;
        tracing::info!(%target, "status events enabled");
        Arc::new(UdpNotifier::bind(target).context("failed to bind status event socket")?)
    } else {
        Arc::new(NullNotifier)
    };
    let registry = PresenceRegistry::shared(notifier);

    let group = SocketAddrV4::new(config.network.group_addr()?, config.network.port);

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    tokio::spawn(wait_for_signal(shutdown_tx.clone()));

    // ── Sockets first: a broken transport must stop us before anything runs ──

    let advertiser = Advertiser::new(
        node,
        group.into(),
        &config.network,
        config.discovery.advertise_interval(),
        shutdown_tx.subscribe(),
    )?;

    let listener = Listener::new(
        group,
        registry.clone(),
        config.discovery.ignore_self.then(|| local_id.clone()),
        shutdown_tx.subscribe(),
    )?;

    let sweeper = Sweeper::new(
        registry.clone(),
        config.discovery.sweep_interval(),
        config.discovery.liveness_deadline_ms,
        shutdown_tx.subscribe(),
    );

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let advertiser_task = tokio::spawn(advertiser.run());
    let listener_task = tokio::spawn(listener.run());
    let sweeper_task = tokio::spawn(sweeper.run());

    if config.network.api_port != 0 {
        let state = status::StatusState {
            registry: registry.clone(),
            local_id: local_id.clone(),
            started: Instant::now(),
        };
        let port = config.network.api_port;
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = status::serve(state, port, shutdown).await {
                tracing::error!(error = %e, "status server failed");
            }
        });
    }

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    let outcome = tokio::select! {
        _ = shutdown_rx.recv() => {
            tracing::info!("shutting down");
            Ok(())
        }
        r = advertiser_task => task_exit("advertiser", r),
        r = listener_task   => task_exit("listener", r),
        r = sweeper_task    => task_exit("sweeper", r),
    };

    // Stop whatever is still running.
    let _ = shutdown_tx.send(());
    outcome
}

/// Fire the shutdown channel on ctrl-c.
///
/// If the handler cannot be installed the daemon keeps running and can
/// only be stopped by a task failure or a kill.
async fn wait_for_signal(shutdown: broadcast::Sender<()>) {
    wait_for_ctrl_c(tokio::signal::ctrl_c(), shutdown).await
}

async fn wait_for_ctrl_c<F>(signal: F, shutdown: broadcast::Sender<()>)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Turn a finished presence task into the daemon's exit result.
fn task_exit(name: &str, joined: Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(())) => {
            tracing::info!(task = name, "task stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!(task = name, error = %format!("{e:#}"), "task failed");
            Err(e.context(format!("{name} task failed")))
        }
        Err(e) => {
            tracing::error!(task = name, error = %e, "task panicked");
            Err(anyhow::Error::new(e).context(format!("{name} task panicked")))
        }
    }
}
