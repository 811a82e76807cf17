//! Payload codecs for encoded player and party records.
//!
//! Clients exchange player and party records in an encoded text form. The
//! engine only decodes what it must (inbound player payloads) and encodes
//! what it sends. The codec is a pluggable boundary step: implement
//! [`PayloadCodec`] to match whatever encoding your clients speak.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PartyError, Result};
use crate::party::{PartyState, Player};

/// Converts between records and their encoded wire text.
///
/// Implementors only supply the outer layer (`seal`/`open`) around the JSON
/// form of a record. The record-level helpers are provided.
pub trait PayloadCodec: Send + Sync + 'static {
    /// Wrap serialized JSON bytes into wire text.
    fn seal(&self, json: Vec<u8>) -> Result<String>;

    /// Unwrap wire text back into JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PartyError::Decode`] if the text is not valid for this codec.
    fn open(&self, payload: &str) -> Result<Vec<u8>>;

    /// Decode an inbound player payload.
    fn decode_player(&self, payload: &str) -> Result<Player> {
        decode(self, payload)
    }

    fn encode_player(&self, player: &Player) -> Result<String> {
        encode(self, player)
    }

    fn encode_party(&self, party: &PartyState) -> Result<String> {
        encode(self, party)
    }
}

fn decode<C: PayloadCodec + ?Sized, T: DeserializeOwned>(codec: &C, payload: &str) -> Result<T> {
    let json = codec.open(payload)?;
    serde_json::from_slice(&json).map_err(|e| PartyError::Decode(e.to_string()))
}

fn encode<C: PayloadCodec + ?Sized, T: Serialize>(codec: &C, value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(|e| PartyError::Encode(e.to_string()))?;
    codec.seal(json)
}

/// Plain JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn seal(&self, json: Vec<u8>) -> Result<String> {
        String::from_utf8(json).map_err(|e| PartyError::Encode(e.to_string()))
    }

    fn open(&self, payload: &str) -> Result<Vec<u8>> {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Base64 over JSON, the opaque blob format clients send by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec;

impl PayloadCodec for Base64Codec {
    fn seal(&self, json: Vec<u8>) -> Result<String> {
        Ok(STANDARD.encode(json))
    }

    fn open(&self, payload: &str) -> Result<Vec<u8>> {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| PartyError::Decode(format!("invalid base64 payload: {e}")))
    }
}
