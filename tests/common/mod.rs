#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for party engine integration tests.
//!
//! Provides a [`RecordingTransport`] that logs every transport call, a
//! [`FlakyStore`] whose reads and writes can be made to fail or stall, and
//! helpers for building encoded player payloads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use party_sync::codec::PayloadCodec;
use party_sync::{
    Base64Codec, ConnectionId, GroupTransport, MemoryPartyStore, Notification, PartyError,
    PartyState, PartyStore, Player,
};

// ── RecordingTransport ──────────────────────────────────────────────

/// One call made against the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    To(ConnectionId, Notification),
    Group(String, Notification),
    Others(String, ConnectionId, Notification),
    Added(ConnectionId, String),
    Removed(ConnectionId, String),
}

impl Sent {
    /// Notification kind for sends, `None` for group membership changes.
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            Sent::To(_, n) | Sent::Group(_, n) | Sent::Others(_, _, n) => Some(n.kind()),
            Sent::Added(..) | Sent::Removed(..) => None,
        }
    }
}

/// A transport that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    log: StdMutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take and clear the recorded calls.
    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    /// Kinds of all notifications sent so far, clearing the log.
    pub fn take_kinds(&self) -> Vec<&'static str> {
        self.take().iter().filter_map(Sent::kind).collect()
    }

    fn push(&self, sent: Sent) {
        self.log.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl GroupTransport for RecordingTransport {
    async fn send_to(&self, connection: &ConnectionId, note: Notification) -> party_sync::Result<()> {
        self.push(Sent::To(connection.clone(), note));
        Ok(())
    }

    async fn send_to_group(&self, group: &str, note: Notification) -> party_sync::Result<()> {
        self.push(Sent::Group(group.into(), note));
        Ok(())
    }

    async fn send_to_group_except(
        &self,
        group: &str,
        except: &ConnectionId,
        note: Notification,
    ) -> party_sync::Result<()> {
        self.push(Sent::Others(group.into(), except.clone(), note));
        Ok(())
    }

    async fn add_to_group(&self, connection: &ConnectionId, group: &str) -> party_sync::Result<()> {
        self.push(Sent::Added(connection.clone(), group.into()));
        Ok(())
    }

    async fn remove_from_group(
        &self,
        connection: &ConnectionId,
        group: &str,
    ) -> party_sync::Result<()> {
        self.push(Sent::Removed(connection.clone(), group.into()));
        Ok(())
    }
}

// ── FlakyStore ──────────────────────────────────────────────────────

/// A [`MemoryPartyStore`] wrapper with switchable failures.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryPartyStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    stall: StdMutex<Option<Duration>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Release);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Make every access sleep for `delay` before completing.
    pub fn stall(&self, delay: Option<Duration>) {
        *self.stall.lock().unwrap() = delay;
    }

    async fn maybe_stall(&self) {
        let delay = *self.stall.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_write(&self) -> party_sync::Result<()> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(PartyError::Store("cache unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PartyStore for FlakyStore {
    async fn get(&self, key: &str) -> party_sync::Result<Option<PartyState>> {
        self.maybe_stall().await;
        if self.fail_reads.load(Ordering::Acquire) {
            return Err(PartyError::Store("cache unavailable".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, party: &PartyState) -> party_sync::Result<()> {
        self.maybe_stall().await;
        self.check_write()?;
        self.inner.set(key, party).await
    }

    async fn remove(&self, key: &str) -> party_sync::Result<()> {
        self.maybe_stall().await;
        self.check_write()?;
        self.inner.remove(key).await
    }
}

// ── Payload helpers ─────────────────────────────────────────────────

pub fn conn(id: &str) -> ConnectionId {
    ConnectionId::from(id)
}

/// Encoded payload for a plain player with the given character name.
pub fn player_payload(name: &str) -> String {
    encode(&Player::new(name))
}

pub fn encode(player: &Player) -> String {
    Base64Codec.encode_player(player).expect("encode player")
}

pub fn decode(payload: &str) -> Player {
    Base64Codec.decode_player(payload).expect("decode player")
}

/// Decode an encoded party state as sent in `EnteredParty`.
pub fn decode_party(payload: &str) -> PartyState {
    let json = Base64Codec.open(payload).expect("open party payload");
    serde_json::from_slice(&json).expect("party json")
}

/// Character names of a party, in stored order.
pub fn names(party: &PartyState) -> Vec<String> {
    party.players.iter().map(|p| p.name().to_owned()).collect()
}

/// Character name carried by a player-bearing notification.
pub fn note_player_name(note: &Notification) -> String {
    match note {
        Notification::EnteredParty { player, .. }
        | Notification::PlayerJoined { player }
        | Notification::PlayerUpdated { player }
        | Notification::PlayerLeft { player } => decode(player).name().to_owned(),
        Notification::GenericPlayerUpdated { player } => player.name().to_owned(),
        Notification::ForceDisconnect => panic!("ForceDisconnect carries no player"),
    }
}
