//! Configuration system for hostmon.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $HOSTMON_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/hostmon/config.toml
//!   3. ~/.config/hostmon/config.toml

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::wire::{normalize_provides, ServiceDescriptor};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostmonConfig {
    pub identity: IdentityConfig,
    pub network: NetworkConfig,
    pub discovery: DiscoveryConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Peer id to announce. Unset = host name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Fixed address to announce. Unset = resolve from `interface` each tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Interface whose IPv4 address is announced.
    pub interface: String,
    /// Services this node provides.
    pub provides: Vec<ServiceDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// IPv4 multicast group announcements are sent to.
    pub group: String,
    /// UDP port of the group.
    pub port: u16,
    /// Multicast TTL. 1 = stay on the local segment.
    pub multicast_ttl: u32,
    /// Deliver our own announcements back to local listeners.
    pub multicast_loop: bool,
    /// Local HTTP status endpoint port. 0 = disabled.
    pub api_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub advertise_interval_ms: u64,
    pub sweep_interval_ms: u64,
    /// A peer silent for longer than this is evicted.
    pub liveness_deadline_ms: u64,
    /// Drop announcements carrying our own id before they reach the registry.
    pub ignore_self: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Send online/offline events to `target`.
    pub enabled: bool,
    /// Local UDP endpoint receiving status change events.
    pub target: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            id: None,
            address: None,
            interface: "eth0".to_string(),
            provides: Vec::new(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            group: "224.1.1.1".to_string(),
            port: 1900,
            multicast_ttl: 1,
            multicast_loop: true,
            api_port: 9101,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            advertise_interval_ms: 500,
            sweep_interval_ms: 250,
            liveness_deadline_ms: 1000,
            ignore_self: true,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: "127.0.0.1:10000".to_string(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("hostmon")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl HostmonConfig {
    /// Load config: env vars → file → defaults. The result is validated.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::parse(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            HostmonConfig::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("HOSTMON_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&HostmonConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Check the timing invariants and that addresses parse.
    ///
    /// The deadline must exceed the advertise interval, otherwise every
    /// peer would be evicted and re-admitted between two announcements.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.discovery;
        if d.advertise_interval_ms == 0 || d.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "advertise and sweep intervals must be non-zero".into(),
            ));
        }
        if d.liveness_deadline_ms <= d.advertise_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "liveness_deadline_ms ({}) must exceed advertise_interval_ms ({})",
                d.liveness_deadline_ms, d.advertise_interval_ms
            )));
        }
        if d.sweep_interval_ms > d.liveness_deadline_ms {
            return Err(ConfigError::Invalid(format!(
                "sweep_interval_ms ({}) must not exceed liveness_deadline_ms ({})",
                d.sweep_interval_ms, d.liveness_deadline_ms
            )));
        }

        let group = self.network.group_addr()?;
        if !group.is_multicast() {
            return Err(ConfigError::Invalid(format!(
                "group {} is not a multicast address",
                group
            )));
        }
        if self.notify.enabled {
            self.notify.target_addr()?;
        }
        if matches!(&self.identity.id, Some(id) if id.is_empty()) {
            return Err(ConfigError::Invalid("identity.id must not be empty".into()));
        }
        Ok(())
    }

    /// Apply HOSTMON_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by env var name.
    ///
    /// A value that does not parse is an error, never silently skipped.
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOSTMON_IDENTITY__ID") {
            self.identity.id = Some(v);
        }
        if let Some(v) = lookup("HOSTMON_IDENTITY__ADDRESS") {
            self.identity.address = Some(v);
        }
        if let Some(v) = lookup("HOSTMON_IDENTITY__INTERFACE") {
            self.identity.interface = v;
        }
        if let Some(v) = lookup("HOSTMON_NETWORK__GROUP") {
            self.network.group = v;
        }
        if let Some(v) = lookup("HOSTMON_NETWORK__PORT") {
            self.network.port = parse_override("HOSTMON_NETWORK__PORT", &v)?;
        }
        if let Some(v) = lookup("HOSTMON_NETWORK__API_PORT") {
            self.network.api_port = parse_override("HOSTMON_NETWORK__API_PORT", &v)?;
        }
        if let Some(v) = lookup("HOSTMON_DISCOVERY__ADVERTISE_INTERVAL_MS") {
            self.discovery.advertise_interval_ms =
                parse_override("HOSTMON_DISCOVERY__ADVERTISE_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("HOSTMON_DISCOVERY__SWEEP_INTERVAL_MS") {
            self.discovery.sweep_interval_ms =
                parse_override("HOSTMON_DISCOVERY__SWEEP_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("HOSTMON_DISCOVERY__LIVENESS_DEADLINE_MS") {
            self.discovery.liveness_deadline_ms =
                parse_override("HOSTMON_DISCOVERY__LIVENESS_DEADLINE_MS", &v)?;
        }
        if let Some(v) = lookup("HOSTMON_DISCOVERY__IGNORE_SELF") {
            self.discovery.ignore_self = parse_flag("HOSTMON_DISCOVERY__IGNORE_SELF", &v)?;
        }
        if let Some(v) = lookup("HOSTMON_NOTIFY__ENABLED") {
            self.notify.enabled = parse_flag("HOSTMON_NOTIFY__ENABLED", &v)?;
        }
        if let Some(v) = lookup("HOSTMON_NOTIFY__TARGET") {
            self.notify.target = v;
        }
        Ok(())
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{key}={value:?}: {e}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConfigError::Invalid(format!(
            "{key}={other:?}: expected true, false, 1 or 0"
        ))),
    }
}

impl IdentityConfig {
    /// Canonical set of advertised service names.
    pub fn provided_services(&self) -> BTreeSet<String> {
        normalize_provides(self.provides.iter().cloned())
    }
}

impl NetworkConfig {
    pub fn group_addr(&self) -> Result<Ipv4Addr, ConfigError> {
        self.group
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("group {:?} is not an IPv4 address", self.group)))
    }
}

impl DiscoveryConfig {
    pub fn advertise_interval(&self) -> Duration {
        Duration::from_millis(self.advertise_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl NotifyConfig {
    pub fn target_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.target
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("notify target {:?} is not host:port", self.target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = HostmonConfig::default();
        config.validate().expect("defaults must validate");
        assert_eq!(config.network.group, "224.1.1.1");
        assert_eq!(config.network.port, 1900);
        assert!(config.discovery.ignore_self);
        assert!(config.identity.id.is_none());
    }

    #[test]
    fn parse_partial_file_keeps_defaults() {
        let config = HostmonConfig::parse(
            r#"
            [identity]
            id = "build-01"

            [discovery]
            liveness_deadline_ms = 2000
            "#,
        )
        .unwrap();

        assert_eq!(config.identity.id.as_deref(), Some("build-01"));
        assert_eq!(config.identity.interface, "eth0");
        assert_eq!(config.discovery.liveness_deadline_ms, 2000);
        assert_eq!(config.discovery.advertise_interval_ms, 500);
        assert_eq!(config.notify.target, "127.0.0.1:10000");
    }

    #[test]
    fn provides_accepts_both_shapes() {
        let config = HostmonConfig::parse(
            r#"
            [identity]
            provides = ["ssh", { service = "render" }, { port = 80 }]
            "#,
        )
        .unwrap();

        let services = config.identity.provided_services();
        assert_eq!(services.len(), 2);
        assert!(services.contains("ssh"));
        assert!(services.contains("render"));
    }

    #[test]
    fn deadline_must_exceed_advertise_interval() {
        let mut config = HostmonConfig::default();
        config.discovery.advertise_interval_ms = 1000;
        config.discovery.liveness_deadline_ms = 1000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn sweep_interval_bounded_by_deadline() {
        let mut config = HostmonConfig::default();
        config.discovery.sweep_interval_ms = 5000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn non_multicast_group_rejected() {
        let mut config = HostmonConfig::default();
        config.network.group = "10.0.0.1".into();
        assert!(config.validate().is_err());

        config.network.group = "not-an-ip".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_notify_target_only_matters_when_enabled() {
        let mut config = HostmonConfig::default();
        config.notify.target = "localhost".into();
        assert!(config.validate().is_err());

        config.notify.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_config_serializes_to_toml() {
        let text = toml::to_string_pretty(&HostmonConfig::default()).unwrap();
        let back = HostmonConfig::parse(&text).unwrap();
        assert_eq!(back.network.port, 1900);
        assert!(back.identity.provides.is_empty());
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: std::collections::HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = HostmonConfig::default();
        config
            .apply_overrides(env(&[
                ("HOSTMON_IDENTITY__ID", "edge-7"),
                ("HOSTMON_DISCOVERY__LIVENESS_DEADLINE_MS", "3000"),
                ("HOSTMON_NOTIFY__ENABLED", "false"),
            ]))
            .unwrap();

        assert_eq!(config.identity.id.as_deref(), Some("edge-7"));
        assert_eq!(config.discovery.liveness_deadline_ms, 3000);
        assert!(!config.notify.enabled);
        assert_eq!(config.network.port, 1900);
    }

    #[test]
    fn unparsable_override_is_rejected() {
        let mut config = HostmonConfig::default();
        let err = config
            .apply_overrides(env(&[("HOSTMON_DISCOVERY__LIVENESS_DEADLINE_MS", "1s")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("LIVENESS_DEADLINE_MS")));
        assert_eq!(config.discovery.liveness_deadline_ms, 1000);

        let err = config
            .apply_overrides(env(&[("HOSTMON_DISCOVERY__IGNORE_SELF", "ture")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(config.discovery.ignore_self);

        assert!(config
            .apply_overrides(env(&[("HOSTMON_NETWORK__PORT", "70000")]))
            .is_err());
    }

    #[test]
    fn write_default_if_missing_creates_file() {
        let tmp = std::env::temp_dir()
            .join(format!("hostmon-config-test-{}", std::process::id()));
        let config_path = tmp.join("config.toml");
        std::fs::create_dir_all(&tmp).unwrap();

        unsafe {
            std::env::set_var("HOSTMON_CONFIG", config_path.to_str().unwrap());
        }

        let path = HostmonConfig::write_default_if_missing().expect("write_default_if_missing failed");
        assert!(path.exists());

        let config = HostmonConfig::load().expect("load should succeed");
        assert_eq!(config.network.group, "224.1.1.1");

        unsafe {
            std::env::remove_var("HOSTMON_CONFIG");
        }
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
