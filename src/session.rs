//! Per-connection event loop.
//!
//! A transport that receives events on a socket feeds them into a
//! [`ConnectionSession`]. The session's background loop hands each event to
//! the [`SessionCoordinator`] on its own task, mirroring how a hub dispatches
//! concurrent invocations, and runs disconnect cleanup once the connection
//! goes away.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "transport-local")]
//! # async fn example() -> party_sync::Result<()> {
//! use std::sync::Arc;
//! use party_sync::session::ConnectionSession;
//! use party_sync::{LocalGroupTransport, MemoryPartyStore, SessionCoordinator};
//!
//! let coordinator = Arc::new(SessionCoordinator::new(
//!     MemoryPartyStore::new(),
//!     LocalGroupTransport::new(),
//! ));
//! let (conn, _inbox) = coordinator.transport().connect();
//!
//! let mut session = ConnectionSession::start(Arc::clone(&coordinator), conn);
//! // session.submit(event)?; for every event read off the socket
//! session.close().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::codec::PayloadCodec;
use crate::coordinator::SessionCoordinator;
use crate::error::{PartyError, Result};
use crate::protocol::{ConnectionId, InboundEvent};
use crate::store::PartyStore;
use crate::transport::GroupTransport;

/// Handle to one connection's background event loop.
///
/// Dropping the handle ends the loop the same way [`close`](Self::close)
/// does, except nobody waits for the cleanup to finish.
pub struct ConnectionSession {
    connection: ConnectionId,
    event_tx: mpsc::Sender<InboundEvent>,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ConnectionSession {
    /// Spawn the event loop for `connection`.
    ///
    /// The inbound queue capacity comes from the coordinator's
    /// [`CoordinatorConfig`](crate::CoordinatorConfig).
    pub fn start<S, T, C>(
        coordinator: Arc<SessionCoordinator<S, T, C>>,
        connection: ConnectionId,
    ) -> Self
    where
        S: PartyStore,
        T: GroupTransport,
        C: PayloadCodec,
    {
        let capacity = coordinator.config().event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_connection(
            coordinator,
            connection.clone(),
            event_rx,
            shutdown_rx,
        ));

        Self {
            connection,
            event_tx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn connection(&self) -> &ConnectionId {
        &self.connection
    }

    /// Queue an inbound event for processing.
    ///
    /// # Errors
    ///
    /// Returns [`PartyError::TransportSend`] if the queue is full and
    /// [`PartyError::NotConnected`] once the loop has stopped.
    pub fn submit(&self, event: InboundEvent) -> Result<()> {
        self.event_tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                PartyError::TransportSend(format!("event queue full for {}", self.connection))
            }
            mpsc::error::TrySendError::Closed(_) => PartyError::NotConnected,
        })
    }

    /// Report the connection as gone and wait for disconnect cleanup.
    pub async fn close(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(join_err) = task.await {
                warn!(conn = %self.connection, "connection loop terminated with join error: {join_err}");
            }
        }
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("connection", &self.connection)
            .field("running", &self.task.is_some())
            .finish()
    }
}

/// Drive one connection until its event stream ends or `shutdown` fires.
///
/// Every event is dispatched on its own task, so events from one connection
/// may complete out of order. Disconnect cleanup runs after all in-flight
/// events have finished, so a late join can never re-index a connection
/// that has already been cleaned up.
pub async fn run_connection<S, T, C>(
    coordinator: Arc<SessionCoordinator<S, T, C>>,
    connection: ConnectionId,
    mut events: mpsc::Receiver<InboundEvent>,
    mut shutdown: oneshot::Receiver<()>,
) where
    S: PartyStore,
    T: GroupTransport,
    C: PayloadCodec,
{
    debug!(conn = %connection, "connection loop started");
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    debug!(conn = %connection, "event stream closed");
                    break;
                };
                let coordinator = Arc::clone(&coordinator);
                let connection = connection.clone();
                in_flight.spawn(async move {
                    coordinator.dispatch(&connection, event).await;
                });
            }

            // Fires on an explicit close and when the session handle is dropped.
            _ = &mut shutdown => {
                debug!(conn = %connection, "connection closed");
                break;
            }

            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(join_err) = done {
                    warn!(conn = %connection, "event task failed: {join_err}");
                }
            }
        }
    }

    while let Some(done) = in_flight.join_next().await {
        if let Err(join_err) = done {
            warn!(conn = %connection, "event task failed: {join_err}");
        }
    }

    if let Err(e) = coordinator.on_disconnect(&connection).await {
        warn!(conn = %connection, "disconnect cleanup failed: {e}");
    }
    debug!(conn = %connection, "connection loop exited");
}

#[cfg(all(test, feature = "transport-local"))]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::party::Player;
    use crate::protocol::Notification;
    use crate::store::MemoryPartyStore;
    use crate::transports::LocalGroupTransport;
    use std::time::Duration;

    async fn next(rx: &mut mpsc::Receiver<Notification>) -> Notification {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("notification in time")
            .expect("inbox open")
    }

    #[tokio::test]
    async fn events_flow_and_close_cleans_up() {
        let coordinator = Arc::new(SessionCoordinator::new(
            MemoryPartyStore::new(),
            LocalGroupTransport::new(),
        ));
        let (conn, mut inbox) = coordinator.transport().connect();
        let mut session = ConnectionSession::start(Arc::clone(&coordinator), conn.clone());

        let player = coordinator
            .codec()
            .encode_player(&Player::new("Alice"))
            .unwrap();
        session
            .submit(InboundEvent::Join {
                party_name: "P".into(),
                player,
            })
            .unwrap();

        assert!(matches!(next(&mut inbox).await, Notification::EnteredParty { .. }));
        assert_eq!(coordinator.party_of(&conn).as_deref(), Some("P"));

        session.close().await;

        assert!(coordinator.party_of(&conn).is_none());
        assert!(coordinator.party("P").await.unwrap().is_none());
        assert!(matches!(
            session.submit(InboundEvent::Leave {
                party_name: "P".into(),
                player: String::new(),
            }),
            Err(PartyError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn dropping_the_handle_still_runs_cleanup() {
        let coordinator = Arc::new(SessionCoordinator::new(
            MemoryPartyStore::new(),
            LocalGroupTransport::new(),
        ));
        let (conn, mut inbox) = coordinator.transport().connect();
        let session = ConnectionSession::start(Arc::clone(&coordinator), conn.clone());
        let player = coordinator
            .codec()
            .encode_player(&Player::new("Alice"))
            .unwrap();
        session
            .submit(InboundEvent::Join {
                party_name: "P".into(),
                player,
            })
            .unwrap();
        let _ = next(&mut inbox).await;

        drop(session);

        tokio::time::timeout(Duration::from_secs(1), async {
            while coordinator.party_of(&conn).is_some() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("cleanup after drop");
        assert!(coordinator.store().is_empty());
    }
}
