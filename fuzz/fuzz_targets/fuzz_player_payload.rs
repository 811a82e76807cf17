#![no_main]

use libfuzzer_sys::fuzz_target;
use party_sync::codec::PayloadCodec;
use party_sync::{Base64Codec, JsonCodec, PartyState};

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = std::str::from_utf8(data) else {
        return;
    };

    // Anything that decodes must survive a re-encode and an admit.
    for player in [
        Base64Codec.decode_player(payload),
        JsonCodec.decode_player(payload),
    ]
    .into_iter()
    .flatten()
    {
        let encoded = Base64Codec.encode_player(&player);
        assert!(encoded.is_ok());

        let mut party = PartyState::new("fuzz", player.clone());
        party.admit(player);
        assert_eq!(party.len(), 1);
    }
});
