//! Presence registry: who is currently announcing on the group.
//!
//! One record per peer id. The listener admits or refreshes records as
//! announcements arrive; the sweeper evicts records whose last announcement
//! is older than the liveness deadline. Both go through a single mutex, so
//! a refresh racing an eviction is resolved by lock order: if the eviction
//! wins, the next announcement admits the peer again as new.
//!
//! Notifications are built inside the critical section but delivered after
//! the lock is released.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hostmon_core::{now_ms, Announcement};

use crate::notify::{Notifier, PeerStatus, StatusChange};

/// Outcome of feeding one announcement to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First announcement for this id; a new record was created.
    Added,
    /// The id was already known; its record was updated.
    Refreshed,
}

/// Everything the registry knows about one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub id: String,
    /// Self-reported address, not the datagram source.
    pub address: String,
    pub architecture: String,
    pub provides: BTreeSet<String>,
    pub active: bool,
    pub operating_system: Option<String>,
    pub release: Option<String>,
    /// When the record was admitted, ms since epoch. Never changes.
    pub first_seen: u64,
    /// Most recent refresh, ms since epoch. Never decreases.
    pub last_seen: u64,
}

impl PeerRecord {
    fn admitted(ann: Announcement, now: u64) -> Self {
        Self {
            id: ann.id,
            address: ann.address,
            architecture: ann.architecture,
            provides: ann.provides,
            active: ann.active,
            operating_system: ann.operating_system,
            release: ann.release,
            first_seen: now,
            last_seen: now,
        }
    }

    fn refresh(&mut self, ann: Announcement, now: u64) {
        self.address = ann.address;
        self.architecture = ann.architecture;
        self.provides = ann.provides;
        self.active = ann.active;
        self.operating_system = ann.operating_system;
        self.release = ann.release;
        self.last_seen = self.last_seen.max(now);
    }

    /// Milliseconds since the last refresh.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_seen)
    }

    fn status_change(&self, status: PeerStatus, now: u64) -> StatusChange {
        StatusChange {
            id: self.id.clone(),
            address: self.address.clone(),
            status,
            architecture: self.architecture.clone(),
            timestamp_ms: now,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("peer descriptor has an empty id")]
    MissingId,
}

/// The presence registry, shared between the listener, sweeper and status tasks.
pub type SharedRegistry = Arc<PresenceRegistry>;

pub struct PresenceRegistry {
    peers: Mutex<HashMap<String, PeerRecord>>,
    notifier: Arc<dyn Notifier>,
}

impl PresenceRegistry {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            notifier,
        }
    }

    /// Create a registry behind an `Arc`, ready to hand to each task.
    pub fn shared(notifier: Arc<dyn Notifier>) -> SharedRegistry {
        Arc::new(Self::new(notifier))
    }

    /// Admit an unknown peer or refresh a known one, timestamped now.
    pub fn admit_or_refresh(&self, ann: Announcement) -> Result<Admission, RegistryError> {
        self.admit_or_refresh_at(ann, now_ms())
    }

    /// Admit or refresh with an explicit timestamp (ms since epoch).
    ///
    /// On refresh every self-reported field is overwritten with the latest
    /// announcement, and `last_seen` only moves forward.
    pub fn admit_or_refresh_at(
        &self,
        ann: Announcement,
        now: u64,
    ) -> Result<Admission, RegistryError> {
        if ann.id.is_empty() {
            return Err(RegistryError::MissingId);
        }

        let online = {
            let mut peers = self.lock();
            match peers.entry(ann.id.clone()) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().refresh(ann, now);
                    None
                }
                Entry::Vacant(entry) => {
                    let record = entry.insert(PeerRecord::admitted(ann, now));
                    Some(record.status_change(PeerStatus::BecameActive, now))
                }
            }
        };

        match online {
            Some(change) => {
                tracing::info!(
                    peer = %change.id,
                    address = %change.address,
                    architecture = %change.architecture,
                    "peer online"
                );
                self.notifier.notify(&change);
                Ok(Admission::Added)
            }
            None => Ok(Admission::Refreshed),
        }
    }

    /// Evict every peer silent for longer than `deadline_ms` as of `now`.
    ///
    /// Returns the evicted ids. An offline event is delivered for each one
    /// after the scan, outside the lock.
    pub fn sweep(&self, now: u64, deadline_ms: u64) -> Vec<String> {
        let evicted: Vec<PeerRecord> = {
            let mut peers = self.lock();
            let expired: Vec<String> = peers
                .values()
                .filter(|record| record.age_ms(now) > deadline_ms)
                .map(|record| record.id.clone())
                .collect();
            expired
                .iter()
                .filter_map(|id| peers.remove(id))
                .collect()
        };

        for record in &evicted {
            tracing::info!(
                peer = %record.id,
                address = %record.address,
                age_ms = record.age_ms(now),
                "peer offline"
            );
            self.notifier
                .notify(&record.status_change(PeerStatus::BecameInactive, now));
        }

        evicted.into_iter().map(|record| record.id).collect()
    }

    /// Consistent copy of every record, ordered by id.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        let mut records: Vec<PeerRecord> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Copy of a single record.
    pub fn get(&self, id: &str) -> Option<PeerRecord> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave a record half-written:
    // every mutation is a single insert, field assignment or remove.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, PeerRecord>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
