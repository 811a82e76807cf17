//! Live connection → party index.
//!
//! The transport forgets which party a connection was in, so this index is
//! the only way to clean up after a connection that drops without leaving.
//! It lives for the lifetime of one process and is owned by the
//! [`SessionCoordinator`](crate::SessionCoordinator), never accessed as
//! global state.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::protocol::ConnectionId;

/// Where a connection currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub party_name: String,
    pub joined_at: DateTime<Utc>,
}

impl IndexEntry {
    pub fn new(party_name: impl Into<String>) -> Self {
        Self {
            party_name: party_name.into(),
            joined_at: Utc::now(),
        }
    }
}

/// Concurrent map from connection id to the party it is in.
///
/// Lookups clone the entry out, so no shard lock is ever held across an
/// `.await` by callers.
#[derive(Debug, Default)]
pub struct ConnectionIndex {
    entries: DashMap<ConnectionId, IndexEntry>,
}

impl ConnectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `connection` is in `party_name`, returning the entry it
    /// replaces.
    pub fn insert(&self, connection: ConnectionId, party_name: &str) -> Option<IndexEntry> {
        self.entries.insert(connection, IndexEntry::new(party_name))
    }

    pub fn get(&self, connection: &ConnectionId) -> Option<IndexEntry> {
        self.entries.get(connection).map(|e| e.value().clone())
    }

    /// The party `connection` is in, if any.
    pub fn party_of(&self, connection: &ConnectionId) -> Option<String> {
        self.entries
            .get(connection)
            .map(|e| e.value().party_name.clone())
    }

    /// Remove `connection` only while it is still indexed under `party_name`.
    ///
    /// A concurrent join into another party is left intact.
    pub fn remove_if_in(&self, connection: &ConnectionId, party_name: &str) -> Option<IndexEntry> {
        self.entries
            .remove_if(connection, |_, entry| entry.party_name == party_name)
            .map(|(_, entry)| entry)
    }

    pub fn contains(&self, connection: &ConnectionId) -> bool {
        self.entries.contains_key(connection)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Connections currently indexed under `party_name`.
    pub fn members_of(&self, party_name: &str) -> Vec<ConnectionId> {
        self.entries
            .iter()
            .filter(|e| e.value().party_name == party_name)
            .map(|e| e.key().clone())
            .collect()
    }
}
