//! Transport implementations for party notifications.
//!
//! This module provides concrete [`GroupTransport`](crate::GroupTransport)
//! implementations behind feature gates:
//!
//! | Feature            | Transport               |
//! |--------------------|-------------------------|
//! | `transport-local`  | [`LocalGroupTransport`] |
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "transport-local")]
//! # async fn example() -> party_sync::error::Result<()> {
//! use party_sync::protocol::Notification;
//! use party_sync::{GroupTransport, LocalGroupTransport};
//!
//! let hub = LocalGroupTransport::new();
//! let (id, mut inbox) = hub.connect();
//! hub.add_to_group(&id, "Raiders").await?;
//! hub.send_to_group("Raiders", Notification::ForceDisconnect).await?;
//!
//! assert_eq!(inbox.recv().await, Some(Notification::ForceDisconnect));
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-local")]
pub mod local;

#[cfg(feature = "transport-local")]
pub use local::LocalGroupTransport;
