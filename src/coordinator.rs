//! Party session coordinator.
//!
//! [`SessionCoordinator`] turns per-connection join / leave / update events
//! into a consistent shared party record in the [`PartyStore`], keeps the
//! [`ConnectionIndex`] in step, and fans notifications out through the
//! [`GroupTransport`].
//!
//! Every mutating operation runs under the party's lock from
//! [`PartyLocks`], so the fetch → modify → store → notify sequence for one
//! party is never interleaved with another handler's.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "transport-local")]
//! # async fn example() -> party_sync::Result<()> {
//! use party_sync::codec::PayloadCodec;
//! use party_sync::{Base64Codec, LocalGroupTransport, MemoryPartyStore, Player, SessionCoordinator};
//!
//! let coordinator = SessionCoordinator::new(MemoryPartyStore::new(), LocalGroupTransport::new());
//! let (conn, _inbox) = coordinator.transport().connect();
//!
//! let payload = Base64Codec.encode_player(&Player::new("Alice"))?;
//! coordinator.join(&conn, "Raiders", &payload).await?;
//!
//! let party = coordinator.party("Raiders").await?.expect("party exists");
//! assert_eq!(party.players[0].name(), "Alice");
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use tracing::{debug, info, warn};

use crate::codec::{Base64Codec, PayloadCodec};
use crate::config::CoordinatorConfig;
use crate::error::{PartyError, Result};
use crate::index::ConnectionIndex;
use crate::locks::PartyLocks;
use crate::party::{Admission, PartyState, Player, Replacement, Upsert};
use crate::protocol::{ConnectionId, InboundEvent, Notification};
use crate::store::PartyStore;
use crate::transport::GroupTransport;

// ── Coordinator ─────────────────────────────────────────────────────

/// Handles party events for every connection of one process.
///
/// Share it between connection tasks behind an `Arc`. The connection index
/// and the party lock table are owned here and live exactly as long as the
/// coordinator.
pub struct SessionCoordinator<S, T, C = Base64Codec> {
    store: S,
    transport: T,
    codec: C,
    index: ConnectionIndex,
    locks: PartyLocks,
    config: CoordinatorConfig,
}

impl<S: PartyStore, T: GroupTransport> SessionCoordinator<S, T, Base64Codec> {
    /// Create a coordinator with the default codec and configuration.
    pub fn new(store: S, transport: T) -> Self {
        Self::with_parts(store, transport, Base64Codec, CoordinatorConfig::new())
    }
}

impl<S: PartyStore, T: GroupTransport, C: PayloadCodec> SessionCoordinator<S, T, C> {
    pub fn with_parts(store: S, transport: T, codec: C, config: CoordinatorConfig) -> Self {
        Self {
            store,
            transport,
            codec,
            index: ConnectionIndex::new(),
            locks: PartyLocks::new(),
            config,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn index(&self) -> &ConnectionIndex {
        &self.index
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Current stored state of `party_name`, if any.
    pub async fn party(&self, party_name: &str) -> Result<Option<PartyState>> {
        self.fetch(&self.config.party_key(party_name)).await
    }

    /// The party `connection` is currently in, according to the index.
    pub fn party_of(&self, connection: &ConnectionId) -> Option<String> {
        self.index.party_of(connection)
    }

    // ── Event entry points ──────────────────────────────────────────

    /// Route one inbound event to its handler.
    ///
    /// Failures are logged and the event is dropped. Nothing is reported to
    /// the remote caller beyond the regular notifications.
    pub async fn dispatch(&self, connection: &ConnectionId, event: InboundEvent) {
        let party_name = event.party_name().to_owned();
        let result = match event {
            InboundEvent::Join { party_name, player } => {
                self.join(connection, &party_name, &player).await
            }
            InboundEvent::Leave { party_name, player } => {
                self.leave(connection, &party_name, &player).await
            }
            InboundEvent::UpdatePlayer { party_name, player } => {
                self.update_player(connection, &party_name, &player).await
            }
            InboundEvent::GenericUpdatePlayer { player, party_name } => {
                self.generic_update_player(player, &party_name).await
            }
        };
        if let Err(e) = result {
            warn!(conn = %connection, party = %party_name, "dropping party event: {e}");
        }
    }

    /// Join `party_name` with an encoded player record.
    ///
    /// # Errors
    ///
    /// Returns [`PartyError::Decode`] for a malformed payload, or a store
    /// error. Either way no shared state has been changed.
    pub async fn join(&self, connection: &ConnectionId, party_name: &str, payload: &str) -> Result<()> {
        let player = self.decode_from(connection, payload)?;
        self.join_player(connection, party_name, player).await
    }

    /// Join `party_name` with an already decoded player record.
    ///
    /// The record's connection id is replaced with `connection`.
    pub async fn join_player(
        &self,
        connection: &ConnectionId,
        party_name: &str,
        mut player: Player,
    ) -> Result<()> {
        player.connection_id = connection.clone();

        // A connection is in at most one party: leave the old one first.
        if let Some(previous) = self.index.party_of(connection) {
            if previous != party_name {
                info!(conn = %connection, from = %previous, to = %party_name, "switching party");
                self.depart(connection, &previous, None).await?;
            }
        }

        let _guard = self.locks.lock(party_name).await;
        let key = self.config.party_key(party_name);

        let (party, superseded) = match self.fetch(&key).await? {
            None => (PartyState::new(party_name, player.clone()), Vec::new()),
            Some(mut party) => match party.admit(player.clone()) {
                Admission::Inserted => (party, Vec::new()),
                Admission::Replaced { superseded } => (party, superseded),
            },
        };

        let encoded = self.codec.encode_player(&player)?;
        let entered = Notification::EnteredParty {
            party: self.codec.encode_party(&party)?,
            player: encoded.clone(),
        };

        self.persist(&key, &party).await?;
        self.index.insert(connection.clone(), party_name);
        debug!(conn = %connection, party = %party_name, members = party.len(), "player joined");

        for old in &superseded {
            debug!(conn = %old, party = %party_name, "connection superseded by reconnect");
            self.index.remove_if_in(old, party_name);
            self.deliver(self.transport.remove_from_group(old, party_name))
                .await;
        }

        self.deliver(self.transport.send_to(connection, entered))
            .await;
        self.deliver(self.transport.add_to_group(connection, party_name))
            .await;
        self.deliver(self.transport.send_to_group_except(
            party_name,
            connection,
            Notification::PlayerJoined {
                player: encoded.clone(),
            },
        ))
        .await;
        self.deliver(
            self.transport
                .send_to_group(party_name, Notification::PlayerUpdated { player: encoded }),
        )
        .await;

        Ok(())
    }

    /// Leave `party_name`. The encoded record identifies the leaving
    /// character, whose companions leave with it.
    pub async fn leave(&self, connection: &ConnectionId, party_name: &str, payload: &str) -> Result<()> {
        let player = self.decode_from(connection, payload)?;
        self.leave_player(connection, party_name, player).await
    }

    /// Leave `party_name` with an already decoded player record.
    pub async fn leave_player(
        &self,
        connection: &ConnectionId,
        party_name: &str,
        mut player: Player,
    ) -> Result<()> {
        player.connection_id = connection.clone();
        self.depart(connection, party_name, Some(player)).await
    }

    /// Replace the caller's own record in `party_name`.
    ///
    /// Emits `ForceDisconnect` to the group when the party no longer exists.
    /// An update from a connection that has no entry is ignored.
    pub async fn update_player(
        &self,
        connection: &ConnectionId,
        party_name: &str,
        payload: &str,
    ) -> Result<()> {
        let player = self.decode_from(connection, payload)?;
        self.update_player_record(connection, party_name, player).await
    }

    /// Replace the caller's own record with an already decoded one.
    pub async fn update_player_record(
        &self,
        connection: &ConnectionId,
        party_name: &str,
        mut player: Player,
    ) -> Result<()> {
        player.connection_id = connection.clone();

        let _guard = self.locks.lock(party_name).await;
        let key = self.config.party_key(party_name);

        let Some(mut party) = self.fetch(&key).await? else {
            debug!(conn = %connection, party = %party_name, "update for missing party");
            self.deliver(
                self.transport
                    .send_to_group(party_name, Notification::ForceDisconnect),
            )
            .await;
            return Ok(());
        };

        let encoded = self.codec.encode_player(&player)?;
        let name = player.name().to_owned();
        match party.replace_by_connection(player) {
            Replacement::Replaced => {}
            Replacement::NotMember => {
                debug!(conn = %connection, party = %party_name, "update from non-member ignored");
                return Ok(());
            }
            Replacement::NameTaken => {
                warn!(
                    conn = %connection,
                    party = %party_name,
                    character = %name,
                    "update to a character held by another entry ignored"
                );
                return Ok(());
            }
        }

        self.persist(&key, &party).await?;
        self.deliver(
            self.transport
                .send_to_group(party_name, Notification::PlayerUpdated { player: encoded }),
        )
        .await;
        Ok(())
    }

    /// Insert or replace a companion entry, matched by character name.
    ///
    /// Does nothing when the party does not exist or when the name belongs
    /// to a connected player. Companions never carry a connection id.
    pub async fn generic_update_player(&self, mut player: Player, party_name: &str) -> Result<()> {
        player.connection_id = ConnectionId::default();

        let _guard = self.locks.lock(party_name).await;
        let key = self.config.party_key(party_name);

        let Some(mut party) = self.fetch(&key).await? else {
            debug!(party = %party_name, companion = %player.name(), "companion update for missing party");
            return Ok(());
        };

        let joined = match party.upsert_by_name(player.clone()) {
            Upsert::Inserted => Some(self.codec.encode_player(&player)?),
            Upsert::Replaced => None,
            Upsert::Rejected => {
                warn!(
                    party = %party_name,
                    companion = %player.name(),
                    "companion update names a connected player, ignored"
                );
                return Ok(());
            }
        };

        self.persist(&key, &party).await?;

        if let Some(encoded) = joined {
            debug!(party = %party_name, companion = %player.name(), "companion added");
            self.deliver(
                self.transport
                    .send_to_group(party_name, Notification::PlayerJoined { player: encoded }),
            )
            .await;
        }
        self.deliver(
            self.transport
                .send_to_group(party_name, Notification::GenericPlayerUpdated { player }),
        )
        .await;
        Ok(())
    }

    /// Clean up after a dropped connection.
    ///
    /// Recovers the connection's party from the index and runs the regular
    /// leave path with the stored record as the leaving identity. Calling it
    /// again for the same connection is a no-op.
    pub async fn on_disconnect(&self, connection: &ConnectionId) -> Result<()> {
        let Some(party_name) = self.index.party_of(connection) else {
            debug!(conn = %connection, "disconnect outside any party");
            return Ok(());
        };
        info!(conn = %connection, party = %party_name, "connection dropped, leaving party");
        self.depart(connection, &party_name, None).await
    }

    // ── Shared leave path ───────────────────────────────────────────

    /// Remove `connection` (and the companions of the leaving character) from
    /// `party_name`.
    ///
    /// `leaving` is the caller-declared identity. When absent the stored
    /// entry of `connection` is used, and a connection with no entry leaves
    /// silently.
    async fn depart(
        &self,
        connection: &ConnectionId,
        party_name: &str,
        leaving: Option<Player>,
    ) -> Result<()> {
        let _guard = self.locks.lock(party_name).await;
        let key = self.config.party_key(party_name);

        let Some(mut party) = self.fetch(&key).await? else {
            self.index.remove_if_in(connection, party_name);
            if let Some(player) = &leaving {
                let encoded = self.codec.encode_player(player)?;
                self.deliver(self.transport.send_to_group_except(
                    party_name,
                    connection,
                    Notification::PlayerLeft { player: encoded },
                ))
                .await;
            }
            self.deliver(self.transport.remove_from_group(connection, party_name))
                .await;
            return Ok(());
        };

        let leaving = leaving.or_else(|| party.find_by_connection(connection).cloned());
        let companions = match &leaving {
            Some(player) => party.remove_hosted_by(player.name()),
            None => Vec::new(),
        };
        let removed = party.remove_connection(connection);

        let companion_notes = companions
            .iter()
            .map(|c| self.codec.encode_player(c))
            .collect::<Result<Vec<_>>>()?;
        let leaving_note = leaving
            .as_ref()
            .map(|p| self.codec.encode_player(p))
            .transpose()?;

        if party.is_empty() {
            self.erase(&key).await?;
            info!(party = %party_name, "party emptied and deleted");
        } else if removed.is_some() || !companions.is_empty() {
            self.persist(&key, &party).await?;
        }
        self.index.remove_if_in(connection, party_name);
        debug!(
            conn = %connection,
            party = %party_name,
            companions = companions.len(),
            "player left"
        );

        for player in companion_notes {
            self.deliver(
                self.transport
                    .send_to_group(party_name, Notification::PlayerLeft { player }),
            )
            .await;
        }
        if let Some(player) = leaving_note {
            self.deliver(self.transport.send_to_group_except(
                party_name,
                connection,
                Notification::PlayerLeft { player },
            ))
            .await;
        }
        self.deliver(self.transport.remove_from_group(connection, party_name))
            .await;
        Ok(())
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Decode a connection-originated payload and bind it to `connection`.
    fn decode_from(&self, connection: &ConnectionId, payload: &str) -> Result<Player> {
        let mut player = self.codec.decode_player(payload)?;
        player.connection_id = connection.clone();
        Ok(player)
    }

    async fn fetch(&self, key: &str) -> Result<Option<PartyState>> {
        self.bounded(key, self.store.get(key)).await
    }

    async fn persist(&self, key: &str, party: &PartyState) -> Result<()> {
        self.bounded(key, self.store.set(key, party)).await
    }

    async fn erase(&self, key: &str) -> Result<()> {
        self.bounded(key, self.store.remove(key)).await
    }

    async fn bounded<R>(&self, key: &str, access: impl Future<Output = Result<R>>) -> Result<R> {
        match tokio::time::timeout(self.config.store_timeout, access).await {
            Ok(result) => result,
            Err(_) => Err(PartyError::StoreTimeout(key.to_owned())),
        }
    }

    /// Await a transport call. The store write has already happened, so a
    /// delivery failure is logged and never unwinds the operation.
    async fn deliver(&self, send: impl Future<Output = Result<()>>) {
        if let Err(e) = send.await {
            warn!("notification delivery failed: {e}");
        }
    }
}

impl<S, T, C> std::fmt::Debug for SessionCoordinator<S, T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("connections", &self.index.len())
            .field("busy_parties", &self.locks.active())
            .field("config", &self.config)
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(all(test, feature = "transport-local"))]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::store::MemoryPartyStore;
    use crate::transports::LocalGroupTransport;
    use tokio::sync::mpsc;

    type Coordinator = SessionCoordinator<MemoryPartyStore, LocalGroupTransport>;

    fn coordinator() -> Coordinator {
        SessionCoordinator::new(MemoryPartyStore::new(), LocalGroupTransport::new())
    }

    fn encode(c: &Coordinator, name: &str) -> String {
        c.codec().encode_player(&Player::new(name)).unwrap()
    }

    fn drain(rx: &mut mpsc::Receiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(note) = rx.try_recv() {
            out.push(note);
        }
        out
    }

    fn kinds(notes: &[Notification]) -> Vec<&'static str> {
        notes.iter().map(Notification::kind).collect()
    }

    #[tokio::test]
    async fn first_join_creates_party_and_replies_to_caller() {
        let c = coordinator();
        let (a, mut rx) = c.transport().connect();

        c.join(&a, "P", &encode(&c, "Alice")).await.unwrap();

        let party = c.party("P").await.unwrap().unwrap();
        assert_eq!(party.len(), 1);
        assert_eq!(party.players[0].connection_id, a);
        assert_eq!(c.party_of(&a).as_deref(), Some("P"));
        assert_eq!(kinds(&drain(&mut rx)), ["EnteredParty", "PlayerUpdated"]);
    }

    #[tokio::test]
    async fn payload_connection_id_is_overridden() {
        let c = coordinator();
        let (a, _rx) = c.transport().connect();
        let forged = Player::new("Alice").with_connection_id(ConnectionId::from("someone-else"));
        let payload = c.codec().encode_player(&forged).unwrap();

        c.join(&a, "P", &payload).await.unwrap();

        let party = c.party("P").await.unwrap().unwrap();
        assert_eq!(party.players[0].connection_id, a);
    }

    #[tokio::test]
    async fn malformed_join_changes_nothing() {
        let c = coordinator();
        let (a, mut rx) = c.transport().connect();

        let err = c.join(&a, "P", "not a payload").await.unwrap_err();

        assert!(matches!(err, PartyError::Decode(_)));
        assert!(c.index().is_empty());
        assert!(c.store().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn dispatch_swallows_errors() {
        let c = coordinator();
        let (a, _rx) = c.transport().connect();
        c.dispatch(
            &a,
            InboundEvent::Join {
                party_name: "P".into(),
                player: "@@@".into(),
            },
        )
        .await;
        assert!(c.store().is_empty());
    }

    #[tokio::test]
    async fn last_leave_deletes_party() {
        let c = coordinator();
        let (a, _rx) = c.transport().connect();
        c.join(&a, "P", &encode(&c, "Alice")).await.unwrap();

        c.leave(&a, "P", &encode(&c, "Alice")).await.unwrap();

        assert!(c.party("P").await.unwrap().is_none());
        assert!(c.index().is_empty());
        assert!(c.transport().group_members("P").is_empty());
    }

    #[tokio::test]
    async fn second_disconnect_is_a_no_op() {
        let c = coordinator();
        let (a, _rx_a) = c.transport().connect();
        let (b, mut rx_b) = c.transport().connect();
        c.join(&a, "P", &encode(&c, "Alice")).await.unwrap();
        c.join(&b, "P", &encode(&c, "Bob")).await.unwrap();
        drain(&mut rx_b);

        c.on_disconnect(&a).await.unwrap();
        let writes = c.store().write_count();
        c.on_disconnect(&a).await.unwrap();

        assert_eq!(c.store().write_count(), writes);
        assert_eq!(kinds(&drain(&mut rx_b)), ["PlayerLeft"]);
    }

    #[test]
    fn debug_output_names_coordinator() {
        let c = coordinator();
        let rendered = format!("{c:?}");
        assert!(rendered.contains("SessionCoordinator"));
    }
}
