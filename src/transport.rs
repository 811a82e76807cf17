//! Transport abstraction for party notifications.
//!
//! The engine never owns client sockets. It talks to whatever layer accepts
//! connections through the [`GroupTransport`] trait: send to one connection,
//! send to a named group (optionally skipping one member), and manage group
//! membership. Each party uses its party name as the group name.
//!
//! Connection setup and teardown are NOT part of this trait. The transport
//! reports disconnects by calling
//! [`SessionCoordinator::on_disconnect`](crate::SessionCoordinator::on_disconnect)
//! (or by closing the inbound stream handed to
//! [`run_connection`](crate::session::run_connection)).
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use party_sync::error::Result;
//! use party_sync::protocol::{ConnectionId, Notification};
//! use party_sync::transport::GroupTransport;
//!
//! struct MyHub { /* ... */ }
//!
//! #[async_trait]
//! impl GroupTransport for MyHub {
//!     async fn send_to(&self, connection: &ConnectionId, note: Notification) -> Result<()> {
//!         // Deliver to one client
//!         Ok(())
//!     }
//!
//!     async fn send_to_group(&self, group: &str, note: Notification) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn send_to_group_except(
//!         &self,
//!         group: &str,
//!         except: &ConnectionId,
//!         note: Notification,
//!     ) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn add_to_group(&self, connection: &ConnectionId, group: &str) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn remove_from_group(&self, connection: &ConnectionId, group: &str) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{ConnectionId, Notification};

/// Group-addressed notification delivery.
///
/// Shared by every concurrently running handler, so all methods take `&self`.
/// Removing a connection from a group it is not in must succeed.
#[async_trait]
pub trait GroupTransport: Send + Sync + 'static {
    /// Send a notification to a single connection.
    ///
    /// # Errors
    ///
    /// Returns [`PartyError::ConnectionClosed`](crate::PartyError::ConnectionClosed)
    /// if the connection is gone.
    async fn send_to(&self, connection: &ConnectionId, note: Notification) -> Result<()>;

    /// Send a notification to every member of `group`.
    async fn send_to_group(&self, group: &str, note: Notification) -> Result<()>;

    /// Send a notification to every member of `group` except `except`.
    async fn send_to_group_except(
        &self,
        group: &str,
        except: &ConnectionId,
        note: Notification,
    ) -> Result<()>;

    /// Add `connection` to `group`. Adding twice is harmless.
    async fn add_to_group(&self, connection: &ConnectionId, group: &str) -> Result<()>;

    /// Remove `connection` from `group`.
    async fn remove_from_group(&self, connection: &ConnectionId, group: &str) -> Result<()>;
}

#[async_trait]
impl<T: GroupTransport + ?Sized> GroupTransport for Arc<T> {
    async fn send_to(&self, connection: &ConnectionId, note: Notification) -> Result<()> {
        (**self).send_to(connection, note).await
    }

    async fn send_to_group(&self, group: &str, note: Notification) -> Result<()> {
        (**self).send_to_group(group, note).await
    }

    async fn send_to_group_except(
        &self,
        group: &str,
        except: &ConnectionId,
        note: Notification,
    ) -> Result<()> {
        (**self).send_to_group_except(group, except, note).await
    }

    async fn add_to_group(&self, connection: &ConnectionId, group: &str) -> Result<()> {
        (**self).add_to_group(connection, group).await
    }

    async fn remove_from_group(&self, connection: &ConnectionId, group: &str) -> Result<()> {
        (**self).remove_from_group(connection, group).await
    }
}
