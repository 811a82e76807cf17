//! Per-party mutual exclusion.
//!
//! The party store only offers whole-record get/set, so two handlers touching
//! the same party could otherwise both read the old record and the later
//! write would silently discard the earlier one. Every mutating coordinator
//! operation therefore runs its read-modify-write-notify sequence while
//! holding that party's [`PartyGuard`].
//!
//! Lock entries are created on demand and dropped again once nobody holds or
//! waits on them, so the table only ever tracks busy parties.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Table of async locks keyed by party name.
#[derive(Debug, Default, Clone)]
pub struct PartyLocks {
    table: Arc<LockTable>,
}

impl PartyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `party_name`.
    pub async fn lock(&self, party_name: &str) -> PartyGuard {
        // The shard guard from `entry` is released at the end of this statement.
        let mutex = Arc::clone(self.table.entry(party_name.to_owned()).or_default().value());
        let guard = mutex.lock_owned().await;
        PartyGuard {
            guard: Some(guard),
            party_name: party_name.to_owned(),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of parties currently locked or waited on.
    pub fn active(&self) -> usize {
        self.table.len()
    }
}

/// Exclusive access to one party. Released on drop.
#[derive(Debug)]
pub struct PartyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    party_name: String,
    table: Arc<LockTable>,
}

impl PartyGuard {
    pub fn party_name(&self) -> &str {
        &self.party_name
    }
}

impl Drop for PartyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table itself still references an idle lock.
        self.table
            .remove_if(&self.party_name, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
