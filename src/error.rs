//! Error types for the party synchronization engine.

use thiserror::Error;

use crate::protocol::ConnectionId;

/// Errors that can occur while processing a party event.
///
/// None of these ever reach a remote client directly. The coordinator's
/// [`dispatch`](crate::SessionCoordinator::dispatch) entry point logs them and
/// drops the offending call.
#[derive(Debug, Error)]
pub enum PartyError {
    /// An inbound payload could not be decoded into a player record.
    #[error("payload decode error: {0}")]
    Decode(String),

    /// A record could not be encoded for an outbound notification.
    #[error("payload encode error: {0}")]
    Encode(String),

    /// Failed to serialize or deserialize a stored or wire value.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The party store rejected or failed an operation.
    #[error("party store error: {0}")]
    Store(String),

    /// A party store access did not complete within the configured timeout.
    #[error("party store timed out on key {0}")]
    StoreTimeout(String),

    /// Failed to hand a notification to the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// The target connection is no longer attached to the transport.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// The coordinator backing a connection session has been dropped.
    #[error("coordinator is no longer running")]
    NotConnected,
}

impl PartyError {
    /// Returns `true` for failures of the shared store, which leave both the
    /// store and the connection index untouched.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_) | Self::StoreTimeout(_))
    }
}

/// A specialized [`Result`] type for party engine operations.
pub type Result<T> = std::result::Result<T, PartyError>;
