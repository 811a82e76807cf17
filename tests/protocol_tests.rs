#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire format tests for the party engine.
//!
//! Verifies that inbound events, notifications and stored party records
//! match JSON fixtures shaped like real client traffic, and that encoded
//! payloads decode across both codecs.

use party_sync::codec::PayloadCodec;
use party_sync::{
    Base64Codec, ConnectionId, InboundEvent, JsonCodec, Notification, PartyState, Player,
};
use serde_json::json;

// ════════════════════════════════════════════════════════════════════
// Player records
// ════════════════════════════════════════════════════════════════════

const PLAYER_FIXTURE: &str = r#"{
    "connectionID": "c-17",
    "character": { "name": "Alice", "level": 92, "class": "Witch" },
    "area": { "name": "The Coast", "timestamp": "2019-06-01T12:00:00Z" },
    "inventory": [1, 2, 3]
}"#;

#[test]
fn player_fixture_keeps_unknown_fields() {
    let player: Player = serde_json::from_str(PLAYER_FIXTURE).expect("parse");

    assert_eq!(player.connection_id, ConnectionId::from("c-17"));
    assert_eq!(player.name(), "Alice");
    assert_eq!(player.character.attributes["level"], json!(92));
    assert_eq!(player.state["area"]["name"], json!("The Coast"));
    assert!(player.generic_host.is_none());

    let back = serde_json::to_value(&player).expect("serialize");
    let original: serde_json::Value = serde_json::from_str(PLAYER_FIXTURE).unwrap();
    assert_eq!(back, original);
}

#[test]
fn companion_fixture_parses_generic_host() {
    let player: Player = serde_json::from_str(
        r#"{ "character": { "name": "Golem" }, "genericHost": "Alice", "life": 500 }"#,
    )
    .expect("parse");

    assert!(player.connection_id.is_empty());
    assert!(player.is_hosted_by("Alice"));
    assert_eq!(player.state["life"], json!(500));
}

#[test]
fn player_without_character_is_rejected() {
    let result = serde_json::from_str::<Player>(r#"{ "connectionID": "c-1" }"#);
    assert!(result.is_err());
}

#[test]
fn party_state_fixture() {
    let party: PartyState = serde_json::from_str(
        r#"{
            "name": "P",
            "players": [
                { "connectionID": "b", "character": { "name": "Bob" } },
                { "connectionID": "a", "character": { "name": "Alice" } }
            ]
        }"#,
    )
    .expect("parse");

    assert_eq!(party.name, "P");
    assert_eq!(party.len(), 2);
    assert_eq!(party.players[0].name(), "Bob");
    assert!(party.find_by_connection(&ConnectionId::from("a")).is_some());
}

// ════════════════════════════════════════════════════════════════════
// Inbound events
// ════════════════════════════════════════════════════════════════════

#[test]
fn join_event_fixture() {
    let event: InboundEvent = serde_json::from_str(
        r#"{ "type": "Join", "data": { "party_name": "P", "player": "eyJ9" } }"#,
    )
    .expect("parse");

    if let InboundEvent::Join { party_name, player } = &event {
        assert_eq!(party_name, "P");
        assert_eq!(player, "eyJ9");
    } else {
        panic!("expected Join, got {event:?}");
    }
    assert_eq!(event.party_name(), "P");
}

#[test]
fn generic_update_event_carries_structured_player() {
    let event: InboundEvent = serde_json::from_value(json!({
        "type": "GenericUpdatePlayer",
        "data": {
            "party_name": "P",
            "player": { "character": { "name": "Golem" }, "genericHost": "Alice" }
        }
    }))
    .expect("parse");

    if let InboundEvent::GenericUpdatePlayer { player, party_name } = event {
        assert_eq!(party_name, "P");
        assert_eq!(player.name(), "Golem");
        assert!(player.is_hosted_by("Alice"));
    } else {
        panic!("expected GenericUpdatePlayer, got {event:?}");
    }
}

#[test]
fn unknown_event_type_is_rejected() {
    let result = serde_json::from_str::<InboundEvent>(
        r#"{ "type": "Disband", "data": { "party_name": "P" } }"#,
    );
    assert!(result.is_err());
}

// ════════════════════════════════════════════════════════════════════
// Notifications
// ════════════════════════════════════════════════════════════════════

#[test]
fn notification_wire_shapes() {
    let joined = serde_json::to_value(Notification::PlayerJoined {
        player: "abc".into(),
    })
    .unwrap();
    assert_eq!(joined, json!({ "type": "PlayerJoined", "data": { "player": "abc" } }));

    let entered = serde_json::to_value(Notification::EnteredParty {
        party: "p".into(),
        player: "q".into(),
    })
    .unwrap();
    assert_eq!(
        entered,
        json!({ "type": "EnteredParty", "data": { "party": "p", "player": "q" } })
    );

    let kicked = serde_json::to_value(Notification::ForceDisconnect).unwrap();
    assert_eq!(kicked, json!({ "type": "ForceDisconnect" }));
}

#[test]
fn generic_update_notification_embeds_player() {
    let note = Notification::GenericPlayerUpdated {
        player: Player::new("Golem").with_generic_host("Alice"),
    };
    let value = serde_json::to_value(&note).unwrap();

    assert_eq!(value["type"], json!("GenericPlayerUpdated"));
    assert_eq!(value["data"]["player"]["character"]["name"], json!("Golem"));
    assert_eq!(value["data"]["player"]["genericHost"], json!("Alice"));

    let back: Notification = serde_json::from_value(value).unwrap();
    assert_eq!(back, note);
}

// ════════════════════════════════════════════════════════════════════
// Payload codecs
// ════════════════════════════════════════════════════════════════════

#[test]
fn base64_payload_fixture_decodes() {
    // {"character":{"name":"Alice"}}
    let payload = "eyJjaGFyYWN0ZXIiOnsibmFtZSI6IkFsaWNlIn19";

    let player = Base64Codec.decode_player(payload).expect("decode");

    assert_eq!(player.name(), "Alice");
    assert!(player.connection_id.is_empty());
}

#[test]
fn json_codec_reads_plain_json() {
    let player = JsonCodec.decode_player(PLAYER_FIXTURE).expect("decode");
    assert_eq!(player.name(), "Alice");
}

#[test]
fn codecs_do_not_read_each_other() {
    let player = Player::new("Alice").with_state("life", json!(10));
    let as_json = JsonCodec.encode_player(&player).unwrap();
    let as_base64 = Base64Codec.encode_player(&player).unwrap();

    assert!(Base64Codec.decode_player(&as_json).is_err());
    assert!(JsonCodec.decode_player(&as_base64).is_err());
}

#[test]
fn encoded_party_is_a_party_state() {
    let party = PartyState::new("P", Player::new("Alice"));
    let encoded = Base64Codec.encode_party(&party).unwrap();

    let opened = Base64Codec.open(&encoded).unwrap();
    let back: PartyState = serde_json::from_slice(&opened).unwrap();
    assert_eq!(back, party);
}
