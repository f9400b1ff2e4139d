//! hostmon wire format: the announcement every node multicasts.
//!
//! An announcement is a single JSON object per datagram. Only `id` is
//! required; every other field falls back to an empty default so older
//! or partial senders are still admitted. `provides` is accepted either as
//! an array of service names or as the legacy array of `{"service": ..}`
//! objects, and is always normalized to a set of names on decode.

use std::collections::BTreeSet;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

/// Receive buffer size. Larger datagrams are truncated and fail to decode.
pub const MAX_DATAGRAM: usize = 4096;

// ── Announcement ──────────────────────────────────────────────────────────────

/// A node's self-description, as sent on the wire and as decoded from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Announcement {
    /// Stable peer identity (host name unless configured).
    pub id: String,
    /// Address the peer claims to be reachable at.
    pub address: String,
    /// Whether the peer is currently an active provider.
    pub active: bool,
    /// Free-form platform tag, e.g. `x86_64`.
    pub architecture: String,
    /// Advertised service names.
    pub provides: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

impl Announcement {
    /// Serialize to the JSON datagram payload.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse a received datagram.
    ///
    /// Fails on anything that is not a JSON object, on wrongly typed
    /// fields, and on a missing or empty `id`.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        // A derived struct also accepts a JSON array positionally.
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        let raw = RawAnnouncement::deserialize(value)?;

        let id = match raw.id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(DecodeError::MissingId),
        };

        Ok(Self {
            id,
            address: raw.address.unwrap_or_default(),
            active: raw.active.unwrap_or(false),
            architecture: raw.architecture.unwrap_or_default(),
            provides: normalize_provides(raw.provides.unwrap_or_default()),
            operating_system: raw.operating_system,
            release: raw.release,
        })
    }
}

/// Loose shape used only for decoding; every field may be absent or null.
#[derive(Deserialize)]
struct RawAnnouncement {
    id: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    architecture: Option<String>,
    #[serde(default)]
    provides: Option<Vec<ServiceDescriptor>>,
    #[serde(default)]
    operating_system: Option<String>,
    #[serde(default)]
    release: Option<String>,
}

// ── Service descriptors ───────────────────────────────────────────────────────

/// One entry of a `provides` list, in either accepted shape.
///
/// Also used by the configuration file, so `provides = ["ssh"]` and
/// `[[identity.provides]] service = "ssh"` both work there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServiceDescriptor {
    Name(String),
    Table {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service: Option<String>,
    },
}

impl ServiceDescriptor {
    /// The service name, if this entry carries one.
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            ServiceDescriptor::Name(name) => name.as_str(),
            ServiceDescriptor::Table { service } => service.as_deref()?,
        };
        (!name.is_empty()).then_some(name)
    }
}

// Hand-written so a table entry must really be a map: a derived untagged
// enum would also take `["svc"]` as `{service: "svc"}`.
impl<'de> Deserialize<'de> for ServiceDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DescriptorVisitor)
    }
}

struct DescriptorVisitor;

impl<'de> Visitor<'de> for DescriptorVisitor {
    type Value = ServiceDescriptor;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("a service name or a table with a `service` key")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(ServiceDescriptor::Name(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(ServiceDescriptor::Name(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut service = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == "service" {
                service = map.next_value::<Option<String>>()?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(ServiceDescriptor::Table { service })
    }
}

/// Collapse a list of descriptors into the canonical set of names.
/// Entries without a name are skipped.
pub fn normalize_provides<I>(entries: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = ServiceDescriptor>,
{
    entries
        .into_iter()
        .filter_map(|entry| entry.name().map(str::to_owned))
        .collect()
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed announcement: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("announcement is not a JSON object")]
    NotAnObject,
    #[error("announcement is missing a non-empty id")]
    MissingId,
}
