//! In-process group transport over tokio channels.
//!
//! [`LocalGroupTransport`] hands every connection a bounded
//! [`mpsc::Receiver<Notification>`] and fans group sends out to the members'
//! senders. It is what the demo and the integration tests run against, and a
//! reasonable base for embedding the engine behind a custom socket layer.
//!
//! # Feature gate
//!
//! Only available with the `transport-local` feature (enabled by default).

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{PartyError, Result};
use crate::protocol::{ConnectionId, Notification};
use crate::transport::GroupTransport;

/// Default capacity of each connection's notification channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// A [`GroupTransport`] that delivers notifications through in-process channels.
///
/// When a connection's channel is full the notification is dropped with a
/// warning rather than stalling the sender.
#[derive(Debug)]
pub struct LocalGroupTransport {
    connections: DashMap<ConnectionId, mpsc::Sender<Notification>>,
    groups: DashMap<String, HashSet<ConnectionId>>,
    capacity: usize,
}

impl Default for LocalGroupTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalGroupTransport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a transport whose per-connection channels hold `capacity`
    /// notifications. Values below 1 are clamped to 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            groups: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a new connection under a freshly generated id.
    #[must_use = "the receiver is the connection's only inbox"]
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<Notification>) {
        let id = ConnectionId::generate();
        let rx = self.attach(id.clone());
        (id, rx)
    }

    /// Register a connection under a caller-chosen id, replacing any previous
    /// inbox for that id.
    #[must_use = "the receiver is the connection's only inbox"]
    pub fn attach(&self, id: ConnectionId) -> mpsc::Receiver<Notification> {
        let (tx, rx) = mpsc::channel(self.capacity);
        debug!(conn = %id, "connection attached");
        self.connections.insert(id, tx);
        rx
    }

    /// Forget a connection and drop it from every group.
    ///
    /// Like a real socket layer, the transport keeps no record of which
    /// parties the connection was in.
    pub fn disconnect(&self, id: &ConnectionId) {
        self.connections.remove(id);
        for mut group in self.groups.iter_mut() {
            group.value_mut().remove(id);
        }
        self.groups.retain(|_, members| !members.is_empty());
        debug!(conn = %id, "connection detached");
    }

    pub fn is_connected(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Current members of `group`, sorted.
    pub fn group_members(&self, group: &str) -> Vec<ConnectionId> {
        let mut members = self.members(group);
        members.sort();
        members
    }

    fn members(&self, group: &str) -> Vec<ConnectionId> {
        self.groups
            .get(group)
            .map(|m| m.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    fn deliver(&self, id: &ConnectionId, note: Notification) -> Result<()> {
        let Some(tx) = self.connections.get(id).map(|s| s.value().clone()) else {
            return Err(PartyError::ConnectionClosed(id.clone()));
        };
        match tx.try_send(note) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(conn = %id, kind = dropped.kind(), "notification channel full, dropping");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(PartyError::ConnectionClosed(id.clone()))
            }
        }
    }

    fn fan_out(&self, group: &str, except: Option<&ConnectionId>, note: &Notification) {
        for member in self.members(group) {
            if Some(&member) == except {
                continue;
            }
            if let Err(e) = self.deliver(&member, note.clone()) {
                debug!(group, conn = %member, "skipping member: {e}");
            }
        }
    }
}

#[async_trait]
impl GroupTransport for LocalGroupTransport {
    async fn send_to(&self, connection: &ConnectionId, note: Notification) -> Result<()> {
        self.deliver(connection, note)
    }

    async fn send_to_group(&self, group: &str, note: Notification) -> Result<()> {
        self.fan_out(group, None, &note);
        Ok(())
    }

    async fn send_to_group_except(
        &self,
        group: &str,
        except: &ConnectionId,
        note: Notification,
    ) -> Result<()> {
        self.fan_out(group, Some(except), &note);
        Ok(())
    }

    async fn add_to_group(&self, connection: &ConnectionId, group: &str) -> Result<()> {
        self.groups
            .entry(group.to_owned())
            .or_default()
            .insert(connection.clone());
        Ok(())
    }

    async fn remove_from_group(&self, connection: &ConnectionId, group: &str) -> Result<()> {
        if let Some(mut members) = self.groups.get_mut(group) {
            members.remove(connection);
        }
        self.groups.remove_if(group, |_, members| members.is_empty());
        Ok(())
    }
}
