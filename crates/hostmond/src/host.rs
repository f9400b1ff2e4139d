//! Host introspection: names and addresses of the local machine.

use std::net::Ipv4Addr;

use anyhow::{Context, Result};

/// The system's host name, used as the default peer id.
pub fn hostname() -> Result<String> {
    let name = nix::unistd::gethostname().context("gethostname()")?;
    let name = name.to_string_lossy().into_owned();
    if name.is_empty() {
        anyhow::bail!("host name is empty");
    }
    Ok(name)
}

/// First IPv4 address assigned to the named interface, if any.
pub fn interface_address(name: &str) -> Result<Option<Ipv4Addr>> {
    let addrs = nix::ifaddrs::getifaddrs().context("getifaddrs()")?;
    for ifaddr in addrs {
        if ifaddr.interface_name != name {
            continue;
        }
        if let Some(sin) = ifaddr.address.as_ref().and_then(|a| a.as_sockaddr_in()) {
            return Ok(Some(Ipv4Addr::from(sin.ip())));
        }
    }
    Ok(None)
}

/// Kernel name, release and machine, as reported by uname(2).
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub operating_system: String,
    pub release: String,
    pub machine: String,
}

impl SystemInfo {
    pub fn current() -> Result<Self> {
        let uts = nix::sys::utsname::uname().context("uname()")?;
        Ok(Self {
            operating_system: uts.sysname().to_string_lossy().into_owned(),
            release: uts.release().to_string_lossy().into_owned(),
            machine: uts.machine().to_string_lossy().into_owned(),
        })
    }
}
