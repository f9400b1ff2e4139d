//! hostmon-services: the presence registry and status change notifiers.

pub mod notify;
pub mod registry;

pub use notify::{Notifier, NullNotifier, PeerStatus, StatusChange, UdpNotifier};
pub use registry::{Admission, PeerRecord, PresenceRegistry, RegistryError, SharedRegistry};
