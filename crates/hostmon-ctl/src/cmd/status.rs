//! Daemon status and peer listing commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    id: String,
    peers_present: usize,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<PeerInfo>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct PeerInfo {
    id: String,
    address: String,
    architecture: String,
    provides: Vec<String>,
    active: bool,
    operating_system: Option<String>,
    release: Option<String>,
    first_seen: u64,
    last_seen: u64,
    last_seen_ms_ago: u64,
}

/// Render a millisecond age the way a human reads it.
fn format_age(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}m{}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  hostmon Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Local id       : {}", resp.id);
    println!("  Peers present  : {}", resp.peers_present);
    println!("  Uptime         : {}s", resp.uptime_secs);

    Ok(())
}

pub async fn cmd_peers(port: u16) -> Result<()> {
    let resp: PeersResponse = get_json(&format!("{}/peers", base_url(port))).await?;

    if resp.peers.is_empty() {
        println!("No peers present.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Present Peers ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        let icon = if p.active { "✓" } else { "○" };
        println!("  ┌─ {} {}", icon, p.id);
        println!("  │  address      : {}", p.address);
        println!("  │  architecture : {}", p.architecture);
        if let Some(os) = &p.operating_system {
            println!(
                "  │  system       : {} {}",
                os,
                p.release.as_deref().unwrap_or("")
            );
        }
        if !p.provides.is_empty() {
            println!("  │  provides     : {}", p.provides.join(", "));
        }
        println!("  └─ last seen    : {} ago", format_age(p.last_seen_ms_ago));
    }

    Ok(())
}
