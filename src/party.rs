//! Party and player records as held in the party store.
//!
//! A [`PartyState`] is the full persisted value for one party. All membership
//! changes made by the coordinator go through the mutation methods here, so
//! the per-party invariants (one entry per character name, one entry per
//! connection id, insertion at the front) live in one place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::ConnectionId;

/// The in-game character a player entry represents.
///
/// `name` is the stable identity key. Everything else the client sends about
/// the character is kept verbatim in `attributes`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Map::new(),
        }
    }
}

/// One member of a party.
///
/// Companion entries set `generic_host` to the character name of the player
/// that owns them and carry no connection of their own.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Transport connection the entry belongs to. Empty for companions.
    #[serde(rename = "connectionID", default)]
    pub connection_id: ConnectionId,
    pub character: Character,
    /// Character name of the owning player, for companion entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_host: Option<String>,
    /// Client-supplied state the engine never interprets.
    #[serde(flatten)]
    pub state: Map<String, Value>,
}

impl Player {
    /// Create a player entry for the given character name.
    pub fn new(character_name: impl Into<String>) -> Self {
        Self {
            character: Character::new(character_name),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_connection_id(mut self, connection_id: ConnectionId) -> Self {
        self.connection_id = connection_id;
        self
    }

    /// Mark this entry as a companion owned by `host`.
    #[must_use]
    pub fn with_generic_host(mut self, host: impl Into<String>) -> Self {
        self.generic_host = Some(host.into());
        self
    }

    /// Attach an opaque client state field.
    #[must_use]
    pub fn with_state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state.insert(key.into(), value);
        self
    }

    /// The character name identifying this entry.
    pub fn name(&self) -> &str {
        &self.character.name
    }

    /// Returns `true` if this entry is a companion owned by `host`.
    pub fn is_hosted_by(&self, host: &str) -> bool {
        self.generic_host.as_deref() == Some(host)
    }

    fn same_identity(&self, other: &Player) -> bool {
        self.character.name == other.character.name
            || (!other.connection_id.is_empty() && self.connection_id == other.connection_id)
    }
}

/// Outcome of admitting a connected player into a party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// No entry matched; the player was inserted at the front.
    Inserted,
    /// An entry matched by name or connection and was replaced in place.
    Replaced {
        /// Connections whose entries were taken over by the new record.
        superseded: Vec<ConnectionId>,
    },
}

/// Outcome of a connected player replacing its own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    Replaced,
    /// No entry belongs to the connection.
    NotMember,
    /// The new character name already belongs to another entry.
    NameTaken,
}

/// Outcome of a character-name upsert for a companion entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
    /// The name belongs to a connected player's entry, which companions never
    /// overwrite.
    Rejected,
}

/// The persisted state of one party.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyState {
    pub name: String,
    pub players: Vec<Player>,
}

impl PartyState {
    /// Create a party holding exactly one player.
    pub fn new(name: impl Into<String>, first: Player) -> Self {
        Self {
            name: name.into(),
            players: vec![first],
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn find_by_connection(&self, connection_id: &ConnectionId) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| &p.connection_id == connection_id)
    }

    /// Admit a connected player, matching an existing entry by character name
    /// or connection id.
    ///
    /// The first matching entry keeps its position and takes the new record.
    /// Any further entry sharing the name or the connection is dropped, so
    /// neither ever appears twice in one party.
    pub fn admit(&mut self, player: Player) -> Admission {
        let Some(index) = self.players.iter().position(|p| p.same_identity(&player)) else {
            self.players.insert(0, player);
            return Admission::Inserted;
        };

        let incoming = player.connection_id.clone();
        let mut superseded = Vec::new();
        let mut note = |old: &ConnectionId| {
            if !old.is_empty() && *old != incoming && !superseded.contains(old) {
                superseded.push(old.clone());
            }
        };

        let mut position = 0;
        self.players.retain(|p| {
            let keep = position == index || !p.same_identity(&player);
            if !keep {
                note(&p.connection_id);
            }
            position += 1;
            keep
        });
        if let Some(old) = self.replace_at(index, player) {
            note(&old.connection_id);
        }

        Admission::Replaced { superseded }
    }

    /// Replace the entry owned by `player.connection_id`, keeping its position.
    ///
    /// The update is refused when the record renames the entry to a character
    /// another entry already holds, so a name never appears twice.
    pub fn replace_by_connection(&mut self, player: Player) -> Replacement {
        let owned = (!player.connection_id.is_empty())
            .then(|| {
                self.players
                    .iter()
                    .position(|p| p.connection_id == player.connection_id)
            })
            .flatten();
        let Some(index) = owned else {
            return Replacement::NotMember;
        };

        let name_taken = self
            .players
            .iter()
            .enumerate()
            .any(|(i, p)| i != index && p.name() == player.name());
        if name_taken {
            return Replacement::NameTaken;
        }

        self.replace_at(index, player);
        Replacement::Replaced
    }

    /// Insert or replace a companion entry matched by character name.
    ///
    /// Companions have no connection of their own, so any connection id on
    /// the record is cleared. An entry held by a connected player is never
    /// replaced.
    pub fn upsert_by_name(&mut self, mut player: Player) -> Upsert {
        player.connection_id = ConnectionId::default();
        match self.players.iter().position(|p| p.name() == player.name()) {
            Some(index) if self.players.get(index).is_some_and(|p| !p.connection_id.is_empty()) => {
                Upsert::Rejected
            }
            Some(index) => {
                self.replace_at(index, player);
                Upsert::Replaced
            }
            None => {
                self.players.insert(0, player);
                Upsert::Inserted
            }
        }
    }

    /// Remove every companion owned by `host`, preserving their order.
    pub fn remove_hosted_by(&mut self, host: &str) -> Vec<Player> {
        let (removed, kept): (Vec<Player>, Vec<Player>) = std::mem::take(&mut self.players)
            .into_iter()
            .partition(|p| p.is_hosted_by(host));
        self.players = kept;
        removed
    }

    /// Remove the entry owned by `connection_id`, if any.
    pub fn remove_connection(&mut self, connection_id: &ConnectionId) -> Option<Player> {
        let index = self
            .players
            .iter()
            .position(|p| &p.connection_id == connection_id)?;
        Some(self.players.remove(index))
    }

    fn replace_at(&mut self, index: usize, player: Player) -> Option<Player> {
        self.players
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, player))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::from(id)
    }

    fn names(party: &PartyState) -> Vec<&str> {
        party.players.iter().map(Player::name).collect()
    }

    #[test]
    fn player_json_keeps_opaque_state() {
        let raw = json!({
            "connectionID": "c1",
            "character": { "name": "Alice", "level": 90, "class": "Witch" },
            "area": "Lioneye's Watch",
            "inventory": [1, 2, 3]
        });
        let player: Player = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(player.name(), "Alice");
        assert_eq!(player.connection_id, conn("c1"));
        assert_eq!(player.character.attributes["level"], json!(90));
        assert_eq!(player.state["area"], json!("Lioneye's Watch"));
        assert!(player.generic_host.is_none());

        assert_eq!(serde_json::to_value(&player).unwrap(), raw);
    }

    #[test]
    fn player_without_connection_id_defaults_to_empty() {
        let player: Player =
            serde_json::from_value(json!({ "character": { "name": "Bot" }, "genericHost": "Alice" }))
                .unwrap();
        assert!(player.connection_id.is_empty());
        assert!(player.is_hosted_by("Alice"));
    }

    #[test]
    fn admit_new_player_goes_to_front() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));
        let outcome = party.admit(Player::new("Bob").with_connection_id(conn("b")));

        assert_eq!(outcome, Admission::Inserted);
        assert_eq!(names(&party), ["Bob", "Alice"]);
    }

    #[test]
    fn admit_same_character_new_connection_replaces_in_place() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));
        party.admit(Player::new("Bob").with_connection_id(conn("b")));

        let outcome = party.admit(Player::new("Alice").with_connection_id(conn("a2")));

        assert_eq!(
            outcome,
            Admission::Replaced {
                superseded: vec![conn("a")]
            }
        );
        assert_eq!(names(&party), ["Bob", "Alice"]);
        assert_eq!(party.players[1].connection_id, conn("a2"));
    }

    #[test]
    fn admit_same_connection_reports_no_supersede() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));
        let outcome = party.admit(
            Player::new("Alice")
                .with_connection_id(conn("a"))
                .with_state("life", json!(100)),
        );

        assert_eq!(
            outcome,
            Admission::Replaced {
                superseded: Vec::new()
            }
        );
        assert_eq!(party.len(), 1);
        assert_eq!(party.players[0].state["life"], json!(100));
    }

    #[test]
    fn admit_never_leaves_duplicate_connection() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));
        party.admit(Player::new("Bob").with_connection_id(conn("b")));

        // Connection "b" switches to the character "Alice" already held by "a".
        let outcome = party.admit(Player::new("Alice").with_connection_id(conn("b")));

        assert_eq!(
            outcome,
            Admission::Replaced {
                superseded: vec![conn("a")]
            }
        );
        assert_eq!(names(&party), ["Alice"]);
        assert_eq!(party.players[0].connection_id, conn("b"));
    }

    #[test]
    fn replace_by_connection_misses_unknown_connection() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));
        assert_eq!(
            party.replace_by_connection(Player::new("Mallory").with_connection_id(conn("x"))),
            Replacement::NotMember
        );
        assert_eq!(
            party.replace_by_connection(Player::new("Mallory")),
            Replacement::NotMember
        );
        assert_eq!(names(&party), ["Alice"]);
    }

    #[test]
    fn replace_by_connection_refuses_a_taken_name() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));
        party.admit(Player::new("Bob").with_connection_id(conn("b")));

        let outcome = party.replace_by_connection(Player::new("Alice").with_connection_id(conn("b")));

        assert_eq!(outcome, Replacement::NameTaken);
        assert_eq!(names(&party), ["Bob", "Alice"]);
    }

    #[test]
    fn replace_by_connection_may_rename_to_a_free_name() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));

        let outcome = party.replace_by_connection(Player::new("Alicia").with_connection_id(conn("a")));

        assert_eq!(outcome, Replacement::Replaced);
        assert_eq!(names(&party), ["Alicia"]);
    }

    #[test]
    fn upsert_by_name_strips_connection_and_spares_members() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));

        let golem = Player::new("Golem").with_generic_host("Alice").with_connection_id(conn("a"));
        assert_eq!(party.upsert_by_name(golem), Upsert::Inserted);
        assert!(party.players[0].connection_id.is_empty());
        assert_eq!(party.find_by_connection(&conn("a")).unwrap().name(), "Alice");

        let imposter = Player::new("Alice").with_generic_host("Golem");
        assert_eq!(party.upsert_by_name(imposter), Upsert::Rejected);
        assert_eq!(party.players[1].connection_id, conn("a"));
        assert!(party.players[1].generic_host.is_none());
    }

    #[test]
    fn upsert_by_name_inserts_then_replaces() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));
        let bot = Player::new("Golem").with_generic_host("Alice");

        assert_eq!(party.upsert_by_name(bot.clone()), Upsert::Inserted);
        assert_eq!(
            party.upsert_by_name(bot.with_state("life", json!(3))),
            Upsert::Replaced
        );
        assert_eq!(names(&party), ["Golem", "Alice"]);
        assert_eq!(party.players[0].state["life"], json!(3));
    }

    #[test]
    fn remove_hosted_by_keeps_others_in_order() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));
        party.admit(Player::new("Bob").with_connection_id(conn("b")));
        party.upsert_by_name(Player::new("Golem").with_generic_host("Alice"));
        party.upsert_by_name(Player::new("Spectre").with_generic_host("Bob"));
        party.upsert_by_name(Player::new("Zombie").with_generic_host("Alice"));

        let removed = party.remove_hosted_by("Alice");

        assert_eq!(
            removed.iter().map(Player::name).collect::<Vec<_>>(),
            ["Zombie", "Golem"]
        );
        assert_eq!(names(&party), ["Spectre", "Bob", "Alice"]);
    }

    #[test]
    fn remove_connection_returns_entry() {
        let mut party = PartyState::new("P", Player::new("Alice").with_connection_id(conn("a")));
        assert!(party.remove_connection(&conn("zzz")).is_none());
        let removed = party.remove_connection(&conn("a")).unwrap();
        assert_eq!(removed.name(), "Alice");
        assert!(party.is_empty());
    }
}
