//! Party store abstraction.
//!
//! The party store is an external keyed cache holding one [`PartyState`] per
//! party under `party:<name>`. It is shared by every engine process pointed
//! at the same cache, so the engine never assumes it owns a record.
//!
//! The store offers plain get/set/remove. Concurrent read-modify-write cycles
//! against one key are serialized by the coordinator, not by the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{PartyError, Result};
use crate::party::PartyState;

/// A keyed cache of party records.
///
/// Implementations must be usable from many tasks at once.
#[async_trait]
pub trait PartyStore: Send + Sync + 'static {
    /// Fetch the party stored under `key`.
    ///
    /// Returns `Ok(None)` when no record exists, which is a normal condition.
    async fn get(&self, key: &str) -> Result<Option<PartyState>>;

    /// Store `party` under `key`, replacing any previous record.
    async fn set(&self, key: &str, party: &PartyState) -> Result<()>;

    /// Delete the record under `key`. Deleting a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<S: PartyStore + ?Sized> PartyStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<PartyState>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, party: &PartyState) -> Result<()> {
        (**self).set(key, party).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }
}

/// In-process party store.
///
/// Records are held serialized, the way a distributed cache holds them, so
/// every `get` hands out an independent copy.
#[derive(Debug, Default)]
pub struct MemoryPartyStore {
    entries: DashMap<String, Vec<u8>>,
    writes: AtomicU64,
}

impl MemoryPartyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored party records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Total number of `set` and `remove` calls served so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }
}

#[async_trait]
impl PartyStore for MemoryPartyStore {
    async fn get(&self, key: &str) -> Result<Option<PartyState>> {
        // Clone the bytes out so the shard guard is released before decoding.
        let Some(bytes) = self.entries.get(key).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PartyError::Store(format!("corrupt record under {key}: {e}")))
    }

    async fn set(&self, key: &str, party: &PartyState) -> Result<()> {
        let bytes = serde_json::to_vec(party)?;
        self.entries.insert(key.to_owned(), bytes);
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
