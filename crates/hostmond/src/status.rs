//! HTTP status endpoint: exposes the presence registry as JSON.

use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use hostmon_core::now_ms;
use hostmon_services::{PresenceRegistry, SharedRegistry};

#[derive(Clone)]
pub struct StatusState {
    pub registry: SharedRegistry,
    pub local_id: String,
    pub started: Instant,
}

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub id: String,
    pub peers_present: usize,
    pub uptime_secs: u64,
}

fn status_response(state: &StatusState) -> StatusResponse {
    StatusResponse {
        id: state.local_id.clone(),
        peers_present: state.registry.len(),
        uptime_secs: state.started.elapsed().as_secs(),
    }
}

async fn handle_status(State(state): State<StatusState>) -> Json<StatusResponse> {
    Json(status_response(&state))
}

// ── /peers ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: String,
    pub address: String,
    pub architecture: String,
    pub provides: Vec<String>,
    pub active: bool,
    pub operating_system: Option<String>,
    pub release: Option<String>,
    pub first_seen: u64,
    pub last_seen: u64,
    pub last_seen_ms_ago: u64,
}

fn peers_response(registry: &PresenceRegistry, now: u64) -> PeersResponse {
    let peers = registry
        .snapshot()
        .into_iter()
        .map(|p| PeerInfo {
            last_seen_ms_ago: p.age_ms(now),
            id: p.id,
            address: p.address,
            architecture: p.architecture,
            provides: p.provides.into_iter().collect(),
            active: p.active,
            operating_system: p.operating_system,
            release: p.release,
            first_seen: p.first_seen,
            last_seen: p.last_seen,
        })
        .collect();

    PeersResponse { peers }
}

async fn handle_peers(State(state): State<StatusState>) -> Json<PeersResponse> {
    Json(peers_response(&state.registry, now_ms()))
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/peers", get(handle_peers))
        .with_state(state)
}

pub async fn serve(
    state: StatusState,
    port: u16,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "status endpoint listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
