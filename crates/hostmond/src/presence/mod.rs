//! Presence protocol: announcing this node and tracking who else is announcing.
//!
//! Three independent tasks share one `PresenceRegistry`:
//!   - the advertiser multicasts our announcement every interval,
//!   - the listener feeds received announcements into the registry,
//!   - the sweeper evicts peers past the liveness deadline.
//!
//! They never signal each other; the registry lock is the only meeting point.

use std::collections::BTreeSet;

use hostmon_core::config::IdentityConfig;
use hostmon_core::Announcement;

use crate::host::{self, SystemInfo};

pub mod advertiser;
pub mod listener;
pub mod sweeper;

pub use advertiser::Advertiser;
pub use listener::Listener;
pub use sweeper::Sweeper;

/// Where the announced address comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSource {
    /// Configured explicitly; announced as-is.
    Fixed(String),
    /// Re-read from this interface on every announcement.
    Interface(String),
}

/// This node's identity, turned into an `Announcement` on every tick.
#[derive(Debug, Clone)]
pub struct LocalNode {
    pub id: String,
    pub source: AddressSource,
    pub architecture: String,
    pub operating_system: Option<String>,
    pub release: Option<String>,
    pub provides: BTreeSet<String>,
    /// Last address resolved from the interface, reused if a lookup fails.
    last_address: String,
}

impl LocalNode {
    pub fn new(id: String, source: AddressSource, system: &SystemInfo, provides: BTreeSet<String>) -> Self {
        let last_address = match &source {
            AddressSource::Fixed(addr) => addr.clone(),
            AddressSource::Interface(_) => String::new(),
        };
        Self {
            id,
            source,
            architecture: system.machine.clone(),
            operating_system: Some(system.operating_system.clone()),
            release: Some(system.release.clone()),
            provides,
            last_address,
        }
    }

    pub fn from_config(id: String, identity: &IdentityConfig, system: &SystemInfo) -> Self {
        let source = match &identity.address {
            Some(addr) => AddressSource::Fixed(addr.clone()),
            None => AddressSource::Interface(identity.interface.clone()),
        };
        Self::new(id, source, system, identity.provided_services())
    }

    /// Build the current self-description.
    pub fn describe(&mut self) -> Announcement {
        if let AddressSource::Interface(name) = &self.source {
            match host::interface_address(name) {
                Ok(Some(addr)) => self.last_address = addr.to_string(),
                Ok(None) => tracing::debug!(interface = %name, "interface has no IPv4 address"),
                Err(e) => tracing::debug!(interface = %name, error = %e, "interface lookup failed"),
            }
        }

        Announcement {
            id: self.id.clone(),
            address: self.last_address.clone(),
            active: true,
            architecture: self.architecture.clone(),
            provides: self.provides.clone(),
            operating_system: self.operating_system.clone(),
            release: self.release.clone(),
        }
    }
}
