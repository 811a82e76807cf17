//! # Party Sync
//!
//! Live party membership for connected game clients.
//!
//! Clients join, leave and update their player record in a named party. The
//! engine keeps the authoritative member list in a shared keyed cache, tracks
//! which party every live connection is in, and pushes membership changes to
//! the rest of the party in real time.
//!
//! ## Features
//!
//! - **Store-agnostic**: implement [`PartyStore`] for your cache
//! - **Transport-agnostic**: implement [`GroupTransport`] for your socket layer
//! - **Per-party serialization**: concurrent handlers never lose each other's writes
//! - **Disconnect recovery**: dropped connections leave their party through the
//!   [`ConnectionIndex`], companions included
//! - **Local transport built-in**: the default `transport-local` feature provides
//!   [`LocalGroupTransport`]

pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod index;
pub mod locks;
pub mod party;
pub mod protocol;
pub mod session;
pub mod store;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use codec::{Base64Codec, JsonCodec, PayloadCodec};
pub use config::CoordinatorConfig;
pub use coordinator::SessionCoordinator;
pub use error::{PartyError, Result};
pub use index::{ConnectionIndex, IndexEntry};
pub use party::{Character, PartyState, Player};
pub use protocol::{ConnectionId, InboundEvent, Notification};
pub use session::ConnectionSession;
pub use store::{MemoryPartyStore, PartyStore};
pub use transport::GroupTransport;

#[cfg(feature = "transport-local")]
pub use transports::LocalGroupTransport;
