//! Wire types exchanged with the transport.
//!
//! Inbound events arrive as [`InboundEvent`]s tagged with the connection the
//! transport received them on. Outbound traffic is always a [`Notification`]
//! addressed to one connection or to a party's group.
//!
//! Player and party payloads on the join/leave/update paths travel in the
//! encoded form produced by a [`PayloadCodec`](crate::codec::PayloadCodec).
//! The generic-update path carries the structured [`Player`] directly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::party::Player;

/// Default prefix of party keys in the party store.
pub const PARTY_KEY_PREFIX: &str = "party:";

// ── Identifiers ─────────────────────────────────────────────────────

/// Transport-assigned identifier of one live connection.
///
/// A client gets a fresh id on every reconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a random connection id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Events a client sends to the party engine.
///
/// Disconnects are not part of this enum: the transport reports them out of
/// band and the engine recovers the party from its connection index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InboundEvent {
    /// Join (or rejoin) a party.
    Join {
        party_name: String,
        /// Encoded player record.
        player: String,
    },
    /// Leave a party.
    Leave { party_name: String, player: String },
    /// Replace the caller's own player record.
    UpdatePlayer { party_name: String, player: String },
    /// Insert or replace a companion entry, matched by character name.
    GenericUpdatePlayer { player: Player, party_name: String },
}

impl InboundEvent {
    /// The party this event targets.
    pub fn party_name(&self) -> &str {
        match self {
            Self::Join { party_name, .. }
            | Self::Leave { party_name, .. }
            | Self::UpdatePlayer { party_name, .. }
            | Self::GenericUpdatePlayer { party_name, .. } => party_name,
        }
    }
}

/// Notifications the engine pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Notification {
    /// Reply to the joining connection only.
    EnteredParty {
        /// Encoded party state after the join.
        party: String,
        /// Encoded player as stored.
        player: String,
    },
    /// A player entered the party.
    PlayerJoined { player: String },
    /// A player's record changed.
    PlayerUpdated { player: String },
    /// A player or companion left the party.
    PlayerLeft { player: String },
    /// A companion entry changed.
    GenericPlayerUpdated { player: Player },
    /// The party no longer exists on the server; clients should drop it.
    ForceDisconnect,
}

impl Notification {
    /// Wire name of the notification, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EnteredParty { .. } => "EnteredParty",
            Self::PlayerJoined { .. } => "PlayerJoined",
            Self::PlayerUpdated { .. } => "PlayerUpdated",
            Self::PlayerLeft { .. } => "PlayerLeft",
            Self::GenericPlayerUpdated { .. } => "GenericPlayerUpdated",
            Self::ForceDisconnect => "ForceDisconnect",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_connection_ids_are_distinct() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn connection_id_serializes_as_plain_string() {
        let id = ConnectionId::from("abc");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("abc"));
        assert_eq!(id.to_string(), "abc");
    }

    #[test]
    fn inbound_event_wire_shape() {
        let json = json!({
            "type": "Join",
            "data": { "party_name": "P", "player": "encoded" }
        });
        let event: InboundEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.party_name(), "P");
        assert!(matches!(event, InboundEvent::Join { ref player, .. } if player == "encoded"));
    }

    #[test]
    fn generic_update_carries_structured_player() {
        let json = json!({
            "type": "GenericUpdatePlayer",
            "data": {
                "party_name": "P",
                "player": { "character": { "name": "Golem" }, "genericHost": "Alice" }
            }
        });
        let event: InboundEvent = serde_json::from_value(json).unwrap();
        match event {
            InboundEvent::GenericUpdatePlayer { player, party_name } => {
                assert_eq!(party_name, "P");
                assert!(player.is_hosted_by("Alice"));
            }
            other => panic!("expected GenericUpdatePlayer, got {other:?}"),
        }
    }

    #[test]
    fn force_disconnect_has_no_payload() {
        let value = serde_json::to_value(Notification::ForceDisconnect).unwrap();
        assert_eq!(value, json!({ "type": "ForceDisconnect" }));
        assert_eq!(Notification::ForceDisconnect.kind(), "ForceDisconnect");
    }
}
