//! hostmon-core: shared types, wire format, and configuration.
//! All other hostmon crates depend on this one.

pub mod config;
pub mod wire;

pub use wire::{Announcement, DecodeError, ServiceDescriptor};

/// Milliseconds since the Unix epoch, as used for every peer timestamp.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
