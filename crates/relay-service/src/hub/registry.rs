//! `ConnectionRegistry` - the set of currently open connections.
//!
//! The registry is the only state shared across connection tasks. All access
//! goes through one mutex, and the lock is never held while sending: fan-out
//! iterates over a snapshot, so a connection added or removed mid-round may or
//! may not be included in that round.

use super::connection::ConnectionHandle;
use crate::observability::metrics::set_connections_active;
use common::types::ConnectionId;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Thread-safe registry of open connections, keyed by identity.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated
    // (every critical section is a single map call), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, ConnectionHandle>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection. Returns false if the identity is already
    /// present, in which case the existing entry is kept.
    pub fn add(&self, connection: ConnectionHandle) -> bool {
        let id = connection.id();
        let count = {
            let mut connections = self.lock();
            if connections.contains_key(&id) {
                drop(connections);
                warn!(
                    target: "relay.hub.registry",
                    connection_id = %id,
                    "Duplicate connection identity, keeping existing entry"
                );
                return false;
            }
            connections.insert(id, connection);
            // Published under the lock so concurrent updates land in order.
            set_connections_active(connections.len());
            connections.len()
        };

        debug!(
            target: "relay.hub.registry",
            connection_id = %id,
            connections = count,
            "Connection registered"
        );
        true
    }

    /// Remove a connection by identity. Removing an absent identity is a
    /// no-op and returns false.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        let (removed, count) = {
            let mut connections = self.lock();
            let removed = connections.remove(id).is_some();
            if removed {
                set_connections_active(connections.len());
            }
            (removed, connections.len())
        };

        if removed {
            debug!(
                target: "relay.hub.registry",
                connection_id = %id,
                connections = count,
                "Connection removed"
            );
        }
        removed
    }

    /// Invoke `f` once for every registered connection except `excluded`.
    ///
    /// Runs over a snapshot taken under the lock; `f` itself runs unlocked.
    /// Returns the number of connections visited.
    pub fn for_each_except<F>(&self, excluded: &ConnectionId, mut f: F) -> usize
    where
        F: FnMut(&ConnectionHandle),
    {
        let targets = self.snapshot_except(excluded);
        for target in &targets {
            f(target);
        }
        targets.len()
    }

    /// Clone every registered handle except `excluded`.
    #[must_use]
    pub fn snapshot_except(&self, excluded: &ConnectionId) -> Vec<ConnectionHandle> {
        self.lock()
            .iter()
            .filter(|(id, _)| *id != excluded)
            .map(|(_, handle)| handle.clone())
            .collect()
    }

    /// Clone every registered handle.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.lock().values().cloned().collect()
    }

    #[must_use]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.lock().contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
